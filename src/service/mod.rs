//! Service-level orchestration: planning, convergence, scaling, lifecycle.
//!
//! A [`Service`] binds one named service definition to a project namespace
//! and an engine client. All state is recovered from engine labels on every
//! call; the struct itself carries no container bookkeeping.

mod execute;
mod plan;
mod scale;

pub use plan::{ConvergenceAction, ConvergencePlan};
pub use scale::{ScaleFailure, ScaleReport, DEFAULT_SCALE_WORKERS};

use crate::config::ServiceDefinition;
use crate::container::{list_containers, ContainerRecord, ListOptions};
use crate::engine::{EngineClient, EngineError};
use crate::error::{Error, Result};
use crate::identity;
use crate::materialize::Materializer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default grace period a container gets to exit before being killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// One managed service within a project namespace.
pub struct Service {
    project: String,
    name: String,
    definition: ServiceDefinition,
    engine: Arc<dyn EngineClient>,
}

impl Service {
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        definition: ServiceDefinition,
        engine: Arc<dyn EngineClient>,
    ) -> Self {
        Service {
            project: project.into(),
            name: name.into(),
            definition,
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    pub(crate) fn engine(&self) -> &dyn EngineClient {
        self.engine.as_ref()
    }

    /// The pinned container name, if the definition declares one. A pinned
    /// name caps the service at a single instance.
    pub fn custom_container_name(&self) -> Option<&str> {
        self.definition.container_name.as_deref()
    }

    pub(crate) fn materializer(&self) -> Materializer<'_> {
        Materializer::new(&self.project, &self.name, &self.definition)
    }

    /// Fingerprint of the current desired configuration.
    pub fn config_hash(&self) -> String {
        self.materializer().fingerprint()
    }

    /// List this service's containers from live engine state.
    pub async fn containers(&self, opts: ListOptions) -> Result<Vec<ContainerRecord>> {
        list_containers(self.engine(), &self.project, &self.name, opts).await
    }

    /// Next free instance number in the requested numbering stream. Numbers
    /// of stopped containers stay reserved until the container is removed.
    pub async fn next_number(&self, one_off: bool) -> Result<u32> {
        let containers = self
            .containers(ListOptions {
                stopped: true,
                one_off,
            })
            .await?;
        Ok(identity::next_number(
            containers.iter().filter_map(|c| c.number),
        ))
    }

    /// Resolve the image this service's containers run, building it from the
    /// declared context when no usable image exists yet.
    ///
    /// A declared `image:` is used verbatim. With only `build:`, the image is
    /// tagged `{project}_{service}` and built on first use.
    pub async fn ensure_image(&self) -> Result<String> {
        if let Some(image) = &self.definition.image {
            return Ok(image.clone());
        }
        let context = self.definition.build.as_ref().ok_or_else(|| {
            Error::NoImage(self.name.clone())
        })?;
        let tag = format!("{}_{}", self.project, self.name);
        if self.engine.image_exists(&tag).await? {
            return Ok(tag);
        }
        tracing::info!(service = %self.name, tag = %tag, "building image");
        self.engine
            .build_image(context.as_ref(), &tag)
            .await
            .map_err(|e| Error::BuildFailed {
                service: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(tag)
    }

    /// Stop all running containers of this service, escalating to kill when
    /// a container outlives its grace period.
    ///
    /// The pass always visits every container; per-container failures are
    /// aggregated into the returned error.
    pub async fn stop(&self, grace: Duration) -> Result<()> {
        let mut errors = Vec::new();
        for container in self.containers(ListOptions::default()).await? {
            tracing::info!(container = %container.name, "stopping");
            if let Err(e) = stop_or_kill(self.engine(), &container.id, grace).await {
                errors.push(e);
            }
        }
        collect_errors(errors)
    }

    /// Kill all running containers of this service immediately.
    pub async fn kill(&self) -> Result<()> {
        let mut errors = Vec::new();
        for container in self.containers(ListOptions::default()).await? {
            tracing::info!(container = %container.name, "killing");
            if let Err(e) = self.engine.kill(&container.id).await {
                errors.push(e.into());
            }
        }
        collect_errors(errors)
    }

    /// Remove all stopped containers of this service, freeing their
    /// instance numbers for reuse. Running containers are left alone.
    pub async fn remove_stopped(&self) -> Result<()> {
        let mut errors = Vec::new();
        for container in self.containers(ListOptions::all()).await? {
            if container.running {
                continue;
            }
            tracing::info!(container = %container.name, "removing");
            if let Err(e) = self.engine.remove(&container.id).await {
                errors.push(e.into());
            }
        }
        collect_errors(errors)
    }

    /// Containers sharing an instance number with an earlier one. A healthy
    /// namespace has none; duplicates appear when an interrupted recreate
    /// leaves both the renamed predecessor and its replacement behind.
    pub async fn duplicate_containers(&self) -> Result<Vec<ContainerRecord>> {
        let containers = self.containers(ListOptions::all()).await?;
        let mut seen: BTreeMap<u32, &ContainerRecord> = BTreeMap::new();
        let mut duplicates = Vec::new();
        for container in &containers {
            let Some(number) = container.number else {
                continue;
            };
            if seen.contains_key(&number) {
                duplicates.push(container.clone());
            } else {
                seen.insert(number, container);
            }
        }
        Ok(duplicates)
    }
}

fn collect_errors(mut errors: Vec<Error>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(Error::Multiple(errors)),
    }
}

/// Stop a container, escalating to kill if the engine call times out.
pub(crate) async fn stop_or_kill(
    engine: &dyn EngineClient,
    id: &str,
    grace: Duration,
) -> Result<()> {
    match engine.stop(id, grace).await {
        Ok(()) => Ok(()),
        Err(EngineError::Timeout { .. }) => {
            tracing::warn!(container = %id, "stop timed out, killing");
            engine.kill(id).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
