//! Convergence planning.
//!
//! Planning is pure classification: compare live container state against the
//! current configuration fingerprint and emit one action per instance. No
//! engine mutation happens here, so a plan can be inspected or logged before
//! anything runs.

use super::Service;
use crate::container::{ContainerRecord, ListOptions};
use crate::error::Result;

/// What convergence will do with one instance slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceAction {
    /// Running and configuration matches.
    NoOp,
    /// Stopped but configuration matches; start in place.
    Start,
    /// Configuration drifted; replace the container, preserving volumes.
    Recreate,
    /// No container exists for the slot yet.
    Create,
}

/// One planned step: an action and the existing container it applies to
/// (`None` only for [`ConvergenceAction::Create`]).
#[derive(Debug, Clone)]
pub struct ConvergencePlan {
    pub action: ConvergenceAction,
    pub container: Option<ContainerRecord>,
}

impl ConvergencePlan {
    fn for_container(action: ConvergenceAction, container: ContainerRecord) -> Self {
        ConvergencePlan {
            action,
            container: Some(container),
        }
    }
}

impl Service {
    /// Classify every existing instance against the desired configuration.
    ///
    /// Fingerprint drift always wins over run state: a drifted container is
    /// recreated whether it is running or stopped. With no containers at
    /// all, the plan is a single create.
    pub async fn plan(&self) -> Result<Vec<ConvergencePlan>> {
        let containers = self.containers(ListOptions::all()).await?;
        if containers.is_empty() {
            return Ok(vec![ConvergencePlan {
                action: ConvergenceAction::Create,
                container: None,
            }]);
        }

        let desired_hash = self.config_hash();
        let plans = containers
            .into_iter()
            .map(|container| {
                let matches = container.config_hash.as_deref() == Some(desired_hash.as_str());
                let action = if !matches {
                    ConvergenceAction::Recreate
                } else if container.running {
                    ConvergenceAction::NoOp
                } else {
                    ConvergenceAction::Start
                };
                ConvergencePlan::for_container(action, container)
            })
            .collect();
        Ok(plans)
    }
}
