//! Plan execution: create, start, and safe recreate.
//!
//! The recreate sequence is ordered so that a crash at any point leaves a
//! recoverable namespace: the predecessor is stopped and renamed aside
//! before the replacement claims the canonical name, and the predecessor's
//! live volume bindings are snapshotted into the replacement before the old
//! container is removed.

use super::{stop_or_kill, Service};
use crate::container::ContainerRecord;
use crate::error::{Error, Result};
use crate::links::resolve_links;
use crate::materialize::CreateOptions;
use crate::service::{ConvergenceAction, ConvergencePlan};
use std::collections::BTreeMap;
use std::time::Duration;

/// Predecessor state carried into a replacement container.
struct Inherited {
    old_id: String,
    volumes: BTreeMap<String, String>,
}

impl Service {
    /// Create one container for this service without starting it.
    ///
    /// Links are resolved against live engine state at this moment; the
    /// instance number is allocated fresh unless the caller pins one.
    pub async fn create_container(
        &self,
        number: Option<u32>,
        one_off: bool,
        overrides: &CreateOptions,
    ) -> Result<ContainerRecord> {
        let number = match number {
            Some(n) => n,
            None => self.next_number(one_off).await?,
        };
        self.create_numbered(number, one_off, overrides, None).await
    }

    async fn create_numbered(
        &self,
        number: u32,
        one_off: bool,
        overrides: &CreateOptions,
        inherited: Option<Inherited>,
    ) -> Result<ContainerRecord> {
        if !one_off && number > 1 {
            if let Some(name) = self.custom_container_name() {
                return Err(Error::Policy(format!(
                    "service '{}' pins the container name '{}' and cannot run more than one instance",
                    self.name(),
                    name
                )));
            }
        }
        let image = self.ensure_image().await?;
        let links = resolve_links(
            self.engine(),
            self.project(),
            self.name(),
            self.definition(),
            one_off,
        )
        .await?;

        let params = match &inherited {
            Some(prev) => self.materializer().create_params(
                &image,
                number,
                one_off,
                overrides,
                links,
                Some(&prev.volumes),
                Some(&prev.old_id),
            )?,
            None => self.materializer().create_params(
                &image,
                number,
                one_off,
                overrides,
                links,
                None,
                None,
            )?,
        };

        tracing::info!(container = %params.name, "creating");
        let id = self.engine().create(&params).await?;

        Ok(ContainerRecord {
            id,
            name: params.name.clone(),
            running: false,
            project: self.project().to_string(),
            service: self.name().to_string(),
            number: Some(number),
            one_off,
            config_hash: Some(self.config_hash()),
            labels: params.labels.into_iter().collect(),
        })
    }

    /// Start a created or stopped container.
    pub async fn start_container(&self, container: &ContainerRecord) -> Result<()> {
        tracing::info!(container = %container.name, "starting");
        self.engine().start(&container.id).await.map_err(|e| {
            if e.is_not_found() {
                Error::NotFound(container.name.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    /// Replace one container with a fresh one built from the current
    /// configuration, preserving its data volumes.
    ///
    /// Sequence: stop (kill on grace timeout), snapshot live volume
    /// bindings, rename the predecessor aside, create the replacement under
    /// the canonical name with the predecessor's volume sources and an
    /// affinity hint to its id, start it, then remove the predecessor.
    /// A failed removal is logged and tolerated; the replacement is already
    /// serving and the leftover shows up as a duplicate for later cleanup.
    pub async fn recreate_container(
        &self,
        container: &ContainerRecord,
        grace: Duration,
    ) -> Result<ContainerRecord> {
        tracing::info!(container = %container.name, "recreating");
        if container.running {
            stop_or_kill(self.engine(), &container.id, grace).await?;
        }

        let details = self.engine().inspect(&container.id).await?;
        let parked_name = format!("{}_{}", container.name, container.short_id());
        self.engine().rename(&container.id, &parked_name).await?;

        let number = container.number.unwrap_or(1);
        let inherited = Inherited {
            old_id: container.id.clone(),
            volumes: details.volumes,
        };
        let replacement = self
            .create_numbered(
                number,
                container.one_off,
                &CreateOptions::default(),
                Some(inherited),
            )
            .await?;
        self.start_container(&replacement).await?;

        if let Err(e) = self.engine().remove(&container.id).await {
            // Already gone is fine; anything else leaves a duplicate behind.
            if !e.is_not_found() {
                tracing::warn!(
                    container = %parked_name,
                    error = %e,
                    "failed to remove replaced container"
                );
            }
        }

        let mut replacement = replacement;
        replacement.running = true;
        Ok(replacement)
    }

    /// Execute a plan, returning the resulting containers.
    ///
    /// Created and started containers end up running; a plain create via
    /// [`Service::create_container`] does not start anything, but convergence
    /// does.
    pub async fn execute_plan(
        &self,
        plans: Vec<ConvergencePlan>,
        grace: Duration,
    ) -> Result<Vec<ContainerRecord>> {
        let mut result = Vec::with_capacity(plans.len());
        for plan in plans {
            match (plan.action, plan.container) {
                (ConvergenceAction::NoOp, Some(container)) => result.push(container),
                (ConvergenceAction::Start, Some(mut container)) => {
                    self.start_container(&container).await?;
                    container.running = true;
                    result.push(container);
                }
                (ConvergenceAction::Recreate, Some(container)) => {
                    result.push(self.recreate_container(&container, grace).await?);
                }
                (ConvergenceAction::Create, _) => {
                    let mut created = self
                        .create_container(None, false, &CreateOptions::default())
                        .await?;
                    self.start_container(&created).await?;
                    created.running = true;
                    result.push(created);
                }
                (action, None) => {
                    return Err(Error::Config(format!(
                        "{:?} plan entry has no container to act on",
                        action
                    )))
                }
            }
        }
        Ok(result)
    }

    /// Plan and execute in one step: make live state match the definition.
    pub async fn converge(&self, grace: Duration) -> Result<Vec<ContainerRecord>> {
        let plans = self.plan().await?;
        self.execute_plan(plans, grace).await
    }
}
