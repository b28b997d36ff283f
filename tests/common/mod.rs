//! In-memory engine used by the integration tests.
//!
//! Faithful enough to exercise convergence and scaling end to end: names
//! must be unique, removal requires a stopped container, anonymous volumes
//! get engine-assigned sources that survive inspection, and images can
//! declare their own volume paths.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use converge::materialize::CreateParams;
use converge::{ContainerDetails, ContainerSummary, EngineClient, EngineError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
    pub volumes: BTreeMap<String, String>,
    pub params: CreateParams,
}

#[derive(Default)]
struct State {
    containers: HashMap<String, MockContainer>,
    images: HashMap<String, Vec<String>>,
    built: Vec<(PathBuf, String)>,
    fail_create_names: HashSet<String>,
    fail_stop_names: HashSet<String>,
    fail_remove_names: HashSet<String>,
    next_id: u64,
}

#[derive(Default)]
pub struct MockEngine {
    state: Mutex<State>,
}

impl MockEngine {
    pub fn new() -> Self {
        let engine = MockEngine::default();
        engine.add_image("busybox:latest", &[]);
        engine
    }

    /// Register an image, optionally with image-declared volume paths.
    pub fn add_image(&self, tag: &str, volumes: &[&str]) {
        self.state.lock().images.insert(
            tag.to_string(),
            volumes.iter().map(|v| v.to_string()).collect(),
        );
    }

    /// Make the next create call for this container name fail.
    pub fn fail_create(&self, name: &str) {
        self.state.lock().fail_create_names.insert(name.to_string());
    }

    /// Make the next stop call for this container name fail.
    pub fn fail_stop(&self, name: &str) {
        self.state.lock().fail_stop_names.insert(name.to_string());
    }

    /// Make the next remove call for this container name fail.
    pub fn fail_remove(&self, name: &str) {
        self.state.lock().fail_remove_names.insert(name.to_string());
    }

    pub fn get_by_name(&self, name: &str) -> Option<MockContainer> {
        self.state
            .lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .containers
            .values()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn running_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn built_tags(&self) -> Vec<String> {
        self.state
            .lock()
            .built
            .iter()
            .map(|(_, tag)| tag.clone())
            .collect()
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn list(
        &self,
        label_filters: &[(&str, &str)],
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let state = self.state.lock();
        let mut summaries: Vec<ContainerSummary> = state
            .containers
            .values()
            .filter(|c| {
                label_filters
                    .iter()
                    .all(|(k, v)| c.labels.get(*k).map(String::as_str) == Some(*v))
            })
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                running: c.running,
                labels: c.labels.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn create(&self, params: &CreateParams) -> Result<String, EngineError> {
        let mut state = self.state.lock();
        if state.fail_create_names.remove(&params.name) {
            return Err(EngineError::cmd_failed(
                "create",
                format!("injected failure for {}", params.name),
                Some(1),
            ));
        }
        if state.containers.values().any(|c| c.name == params.name) {
            return Err(EngineError::NameConflict {
                name: params.name.clone(),
            });
        }

        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);

        let mut volumes = BTreeMap::new();
        for bind in &params.volumes {
            let source = match &bind.host {
                Some(host) => host.clone(),
                None => format!("/var/lib/engine/volumes/{}{}", &id[..12], bind.container),
            };
            volumes.insert(bind.container.clone(), source);
        }
        if let Some(declared) = state.images.get(&params.image) {
            for path in declared.clone() {
                volumes.entry(path.clone()).or_insert_with(|| {
                    format!("/var/lib/engine/volumes/{}{}", &id[..12], path)
                });
            }
        }

        let container = MockContainer {
            id: id.clone(),
            name: params.name.clone(),
            image: params.image.clone(),
            running: false,
            labels: params.labels.clone().into_iter().collect(),
            volumes,
            params: params.clone(),
        };
        state.containers.insert(id.clone(), container);
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match state.containers.get_mut(id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound {
                container: id.to_string(),
            }),
        }
    }

    async fn stop(&self, id: &str, _grace: Duration) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let name = match state.containers.get(id) {
            Some(container) => container.name.clone(),
            None => {
                return Err(EngineError::ContainerNotFound {
                    container: id.to_string(),
                })
            }
        };
        if state.fail_stop_names.remove(&name) {
            return Err(EngineError::cmd_failed(
                "stop",
                format!("injected stop failure for {}", name),
                Some(1),
            ));
        }
        if let Some(container) = state.containers.get_mut(id) {
            container.running = false;
        }
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<(), EngineError> {
        self.stop(id, Duration::ZERO).await
    }

    async fn remove(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(container) = state.containers.get(id) {
            let name = container.name.clone();
            if state.fail_remove_names.remove(&name) {
                return Err(EngineError::cmd_failed(
                    "rm",
                    format!("injected remove failure for {}", name),
                    Some(1),
                ));
            }
        }
        match state.containers.get(id) {
            Some(container) if container.running => Err(EngineError::cmd_failed(
                "rm",
                format!("cannot remove running container {}", container.name),
                Some(1),
            )),
            Some(_) => {
                state.containers.remove(id);
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound {
                container: id.to_string(),
            }),
        }
    }

    async fn rename(&self, id: &str, new_name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state
            .containers
            .values()
            .any(|c| c.name == new_name && c.id != id)
        {
            return Err(EngineError::NameConflict {
                name: new_name.to_string(),
            });
        }
        match state.containers.get_mut(id) {
            Some(container) => {
                container.name = new_name.to_string();
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound {
                container: id.to_string(),
            }),
        }
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        let state = self.state.lock();
        match state.containers.get(id) {
            Some(c) => Ok(ContainerDetails {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                running: c.running,
                labels: c.labels.clone(),
                volumes: c.volumes.clone(),
            }),
            None => Err(EngineError::ContainerNotFound {
                container: id.to_string(),
            }),
        }
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        Ok(self.state.lock().images.contains_key(image))
    }

    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.built.push((context.to_path_buf(), tag.to_string()));
        state.images.insert(tag.to_string(), Vec::new());
        Ok(())
    }
}
