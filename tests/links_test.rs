//! Link and alias resolution against live engine state.

mod common;

use common::MockEngine;
use converge::materialize::CreateOptions;
use converge::{LinkAlias, Service, ServiceDefinition, DEFAULT_SCALE_WORKERS, DEFAULT_STOP_GRACE};
use std::sync::Arc;

fn definition(links: &[&str], external: &[&str]) -> ServiceDefinition {
    ServiceDefinition {
        image: Some("busybox:latest".to_string()),
        command: Some(vec!["top".to_string()]),
        links: links.iter().map(|s| s.to_string()).collect(),
        external_links: external.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

async fn start_db(engine: &Arc<MockEngine>, instances: usize) {
    let db = Service::new("proj", "db", definition(&[], &[]), engine.clone());
    db.scale(instances, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();
}

fn alias_pairs(links: &[LinkAlias]) -> Vec<(String, String)> {
    links
        .iter()
        .map(|l| (l.alias.clone(), l.target.clone()))
        .collect()
}

#[tokio::test]
async fn each_linked_instance_gets_three_alias_forms() {
    let engine = Arc::new(MockEngine::new());
    start_db(&engine, 1).await;

    let web = Service::new("proj", "web", definition(&["db"], &[]), engine.clone());
    web.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let links = engine.get_by_name("proj_web_1").unwrap().params.links;
    let pairs = alias_pairs(&links);
    assert!(pairs.contains(&("proj_db_1".to_string(), "proj_db_1".to_string())));
    assert!(pairs.contains(&("db_1".to_string(), "proj_db_1".to_string())));
    assert!(pairs.contains(&("db".to_string(), "proj_db_1".to_string())));
}

#[tokio::test]
async fn links_cover_every_instance_of_the_target() {
    let engine = Arc::new(MockEngine::new());
    start_db(&engine, 2).await;

    let web = Service::new("proj", "web", definition(&["db"], &[]), engine.clone());
    web.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let links = engine.get_by_name("proj_web_1").unwrap().params.links;
    let aliases: Vec<&str> = links.iter().map(|l| l.alias.as_str()).collect();
    for expected in ["proj_db_1", "db_1", "proj_db_2", "db_2", "db"] {
        assert!(aliases.contains(&expected), "missing alias {}", expected);
    }
    // The service-wide alias resolves to exactly one instance.
    assert_eq!(aliases.iter().filter(|a| **a == "db").count(), 1);
}

#[tokio::test]
async fn custom_alias_replaces_the_service_wide_alias() {
    let engine = Arc::new(MockEngine::new());
    start_db(&engine, 1).await;

    let web = Service::new("proj", "web", definition(&["db:dbase"], &[]), engine.clone());
    web.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let links = engine.get_by_name("proj_web_1").unwrap().params.links;
    let aliases: Vec<&str> = links.iter().map(|l| l.alias.as_str()).collect();
    assert!(aliases.contains(&"dbase"));
    assert!(aliases.contains(&"proj_db_1"));
    assert!(aliases.contains(&"db_1"));
    assert!(!aliases.contains(&"db"));
}

#[tokio::test]
async fn external_links_resolve_without_engine_lookup() {
    let engine = Arc::new(MockEngine::new());

    let web = Service::new(
        "proj",
        "web",
        definition(&[], &["legacy_db", "other_db:short"]),
        engine.clone(),
    );
    web.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let links = engine.get_by_name("proj_web_1").unwrap().params.links;
    let pairs = alias_pairs(&links);
    assert!(pairs.contains(&("legacy_db".to_string(), "legacy_db".to_string())));
    assert!(pairs.contains(&("short".to_string(), "other_db".to_string())));
}

#[tokio::test]
async fn one_off_instances_link_to_their_own_service() {
    let engine = Arc::new(MockEngine::new());
    let web = Service::new("proj", "web", definition(&[], &[]), engine.clone());
    web.converge(DEFAULT_STOP_GRACE).await.unwrap();

    let one_off = web
        .create_container(None, true, &CreateOptions::default())
        .await
        .unwrap();
    assert_eq!(one_off.name, "proj_web_run_1");

    let links = engine.get_by_name("proj_web_run_1").unwrap().params.links;
    let aliases: Vec<&str> = links.iter().map(|l| l.alias.as_str()).collect();
    for expected in ["proj_web_1", "web_1", "web"] {
        assert!(aliases.contains(&expected), "missing alias {}", expected);
    }
}

#[tokio::test]
async fn regular_instances_never_link_to_their_siblings() {
    let engine = Arc::new(MockEngine::new());
    let web = Service::new("proj", "web", definition(&[], &[]), engine.clone());
    web.scale(2, DEFAULT_STOP_GRACE, DEFAULT_SCALE_WORKERS)
        .await
        .unwrap();

    let links = engine.get_by_name("proj_web_2").unwrap().params.links;
    assert!(links.is_empty(), "no self links for regular instances");
}
