//! Scaling behavior: delta execution, failure isolation, reporting.

mod common;

use common::MockEngine;
use converge::{
    EngineClient, Service, ServiceDefinition, DEFAULT_SCALE_WORKERS, DEFAULT_STOP_GRACE,
};
use std::sync::Arc;

fn web_definition() -> ServiceDefinition {
    ServiceDefinition {
        image: Some("busybox:latest".to_string()),
        command: Some(vec!["top".to_string()]),
        ..Default::default()
    }
}

fn service(engine: Arc<MockEngine>) -> Service {
    Service::new("proj", "web", web_definition(), engine)
}

#[tokio::test]
async fn scale_up_creates_missing_instances() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    let first = svc.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let report = svc
        .scale(3, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.desired, 3);
    assert_eq!(report.achieved, 3);
    assert_eq!(report.created.len(), 2);
    assert!(report.failures.is_empty());
    assert!(report.fully_achieved());
    assert_eq!(
        engine.running_names(),
        vec!["proj_web_1", "proj_web_2", "proj_web_3"]
    );
    assert_eq!(
        engine.get_by_name("proj_web_1").unwrap().id,
        first[0].id,
        "scaling up must not touch existing instances"
    );
}

#[tokio::test]
async fn scale_down_removes_highest_numbers_first() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(3, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    let report = svc
        .scale(1, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.achieved, 1);
    assert_eq!(
        report.removed,
        vec!["proj_web_3", "proj_web_2"],
        "surplus is removed highest number first"
    );
    assert_eq!(engine.container_names(), vec!["proj_web_1"]);
}

#[tokio::test]
async fn scale_to_zero_removes_all_instances() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    let report = svc
        .scale(0, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.achieved, 0);
    assert_eq!(report.removed.len(), 2);
    assert!(engine.container_names().is_empty());
}

#[tokio::test]
async fn stopped_instances_are_restarted_not_recreated() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();
    let second = engine.get_by_name("proj_web_2").unwrap();
    engine.stop(&second.id, DEFAULT_STOP_GRACE).await.unwrap();

    let report = svc
        .scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.started, vec!["proj_web_2"]);
    assert!(report.created.is_empty());
    assert_eq!(report.achieved, 2);
    assert_eq!(
        engine.get_by_name("proj_web_2").unwrap().id,
        second.id,
        "the stopped container is reused, not replaced"
    );
}

#[tokio::test]
async fn scale_mixes_restart_and_create() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();
    let second = engine.get_by_name("proj_web_2").unwrap();
    engine.stop(&second.id, DEFAULT_STOP_GRACE).await.unwrap();

    let report = svc
        .scale(3, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.started, vec!["proj_web_2"]);
    assert_eq!(report.created, vec!["proj_web_3"]);
    assert_eq!(report.achieved, 3);
}

#[tokio::test]
async fn one_failing_instance_does_not_abort_the_rest() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(1, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();
    engine.fail_create("proj_web_3");

    let report = svc
        .scale(3, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1, "exactly one unit failed");
    assert_eq!(report.failures[0].instance, "web_3");
    assert!(report.failures[0].message.contains("injected failure"));
    assert_eq!(report.created, vec!["proj_web_2"]);
    assert_eq!(report.achieved, 2);
    assert!(!report.fully_achieved());
}

#[tokio::test]
async fn satisfied_scale_is_a_no_op() {
    let engine = Arc::new(MockEngine::new());
    let svc = service(engine.clone());
    svc.scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();
    let ids_before: Vec<String> = engine
        .container_names()
        .iter()
        .map(|n| engine.get_by_name(n).unwrap().id)
        .collect();

    let report = svc
        .scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert!(report.created.is_empty());
    assert!(report.started.is_empty());
    assert!(report.removed.is_empty());
    assert_eq!(report.achieved, 2);
    assert!(report.fully_achieved());

    let ids_after: Vec<String> = engine
        .container_names()
        .iter()
        .map(|n| engine.get_by_name(n).unwrap().id)
        .collect();
    assert_eq!(ids_before, ids_after);
}

#[tokio::test]
async fn custom_container_name_caps_the_instance_count() {
    let engine = Arc::new(MockEngine::new());
    let mut definition = web_definition();
    definition.container_name = Some("snowflake".to_string());
    let svc = Service::new("proj", "web", definition, engine.clone());

    let report = svc
        .scale(3, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    assert_eq!(report.desired, 1, "a pinned name caps the service at one");
    assert_eq!(report.achieved, 1);
    assert_eq!(engine.running_names(), vec!["snowflake"]);
}
