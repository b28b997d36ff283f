//! Concurrent scaling with per-instance failure isolation.
//!
//! Scaling computes a pure delta between live state and the desired count,
//! then executes every unit of work concurrently under a bounded worker
//! pool. One failing instance never aborts the others; failures are
//! collected into the report and the achieved count is re-measured from the
//! engine afterwards.

use super::{stop_or_kill, Service};
use crate::container::{ContainerRecord, ListOptions};
use crate::error::Result;
use crate::identity::next_numbers;
use crate::materialize::CreateOptions;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default bound on concurrent engine operations during a scale.
pub const DEFAULT_SCALE_WORKERS: usize = 4;

/// One instance that could not be brought to its target state.
#[derive(Debug, Clone)]
pub struct ScaleFailure {
    /// `{service}_{number}` label of the failed instance.
    pub instance: String,
    pub message: String,
}

/// Outcome of one scaling pass.
#[derive(Debug, Clone)]
pub struct ScaleReport {
    pub desired: usize,
    /// Running instances measured from the engine after the pass.
    pub achieved: usize,
    pub created: Vec<String>,
    pub started: Vec<String>,
    pub removed: Vec<String>,
    pub failures: Vec<ScaleFailure>,
}

impl ScaleReport {
    pub fn fully_achieved(&self) -> bool {
        self.achieved == self.desired && self.failures.is_empty()
    }
}

/// Work units a scaling pass executes.
enum ScaleWork {
    Start(ContainerRecord),
    Create(u32),
    Remove(ContainerRecord),
}

enum ScaleDone {
    Started(String),
    Created(String),
    Removed(String),
}

/// Pure delta between live containers and a desired instance count.
struct ScaleDelta {
    to_start: Vec<ContainerRecord>,
    to_create: Vec<u32>,
    to_remove: Vec<ContainerRecord>,
}

impl ScaleDelta {
    fn is_empty(&self) -> bool {
        self.to_start.is_empty() && self.to_create.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the work needed to reach `desired` instances.
///
/// With instances to spare, the lowest-numbered `desired` containers are
/// kept (starting any that are stopped) and the highest-numbered surplus is
/// removed. With too few, stopped containers are reused before new ones are
/// created under the smallest unused numbers.
fn compute_delta(containers: &[ContainerRecord], desired: usize) -> ScaleDelta {
    if containers.len() <= desired {
        let used: Vec<u32> = containers.iter().filter_map(|c| c.number).collect();
        ScaleDelta {
            to_start: containers.iter().filter(|c| !c.running).cloned().collect(),
            to_create: next_numbers(used, desired - containers.len()),
            to_remove: Vec::new(),
        }
    } else {
        let (kept, surplus) = containers.split_at(desired);
        ScaleDelta {
            to_start: kept.iter().filter(|c| !c.running).cloned().collect(),
            to_create: Vec::new(),
            // Highest numbers go first.
            to_remove: surplus.iter().rev().cloned().collect(),
        }
    }
}

impl Service {
    /// Scale to `desired` running instances.
    ///
    /// Work units run concurrently, bounded by `workers`. A failure in one
    /// unit is recorded and the rest proceed; the pass only errors out when
    /// the engine cannot even be listed.
    pub async fn scale(
        &self,
        desired: usize,
        grace: Duration,
        workers: usize,
    ) -> Result<ScaleReport> {
        let mut desired = desired;
        if let Some(name) = self.custom_container_name() {
            if desired > 1 {
                tracing::warn!(
                    service = %self.name(),
                    container_name = %name,
                    "service uses a custom container name and cannot run multiple \
                     instances. Remove the custom name to scale the service."
                );
                desired = 1;
            }
        }

        let containers = self.containers(ListOptions::all()).await?;
        let delta = compute_delta(&containers, desired);

        let mut report = ScaleReport {
            desired,
            achieved: 0,
            created: Vec::new(),
            started: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
        };

        if delta.is_empty() {
            tracing::info!(service = %self.name(), desired, "desired state already satisfied");
            report.achieved = containers.iter().filter(|c| c.running).count();
            return Ok(report);
        }

        let mut work: Vec<ScaleWork> = Vec::new();
        work.extend(delta.to_start.into_iter().map(ScaleWork::Start));
        work.extend(delta.to_create.into_iter().map(ScaleWork::Create));
        work.extend(delta.to_remove.into_iter().map(ScaleWork::Remove));

        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let outcomes = join_all(work.into_iter().map(|unit| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.run_scale_unit(unit, grace).await
            }
        }))
        .await;

        for outcome in outcomes {
            match outcome {
                Ok(ScaleDone::Started(name)) => report.started.push(name),
                Ok(ScaleDone::Created(name)) => report.created.push(name),
                Ok(ScaleDone::Removed(name)) => report.removed.push(name),
                Err(failure) => {
                    tracing::warn!(
                        instance = %failure.instance,
                        error = %failure.message,
                        "scale unit failed"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.achieved = self
            .containers(ListOptions::default())
            .await?
            .len();
        Ok(report)
    }

    async fn run_scale_unit(
        &self,
        unit: ScaleWork,
        grace: Duration,
    ) -> std::result::Result<ScaleDone, ScaleFailure> {
        match unit {
            ScaleWork::Start(container) => {
                self.start_container(&container)
                    .await
                    .map_err(|e| ScaleFailure {
                        instance: container.instance_label(),
                        message: e.to_string(),
                    })?;
                Ok(ScaleDone::Started(container.name))
            }
            ScaleWork::Create(number) => {
                let fail = |e: crate::error::Error| ScaleFailure {
                    instance: format!("{}_{}", self.name(), number),
                    message: e.to_string(),
                };
                let created = self
                    .create_container(Some(number), false, &CreateOptions::default())
                    .await
                    .map_err(fail)?;
                self.start_container(&created).await.map_err(fail)?;
                Ok(ScaleDone::Created(created.name))
            }
            ScaleWork::Remove(container) => {
                let result = async {
                    if container.running {
                        stop_or_kill(self.engine(), &container.id, grace).await?;
                    }
                    self.engine().remove(&container.id).await?;
                    Ok::<_, crate::error::Error>(())
                }
                .await;
                result.map_err(|e| ScaleFailure {
                    instance: container.instance_label(),
                    message: e.to_string(),
                })?;
                Ok(ScaleDone::Removed(container.name))
            }
        }
    }
}
