//! Container records and the label-driven inspector.
//!
//! A [`ContainerRecord`] is a handle to one engine container plus its
//! decoded identity labels. Records are re-fetched from the engine for
//! every planning pass; nothing here caches across calls, so plans never
//! act on stale state.

use crate::engine::{ContainerSummary, EngineClient};
use crate::error::Result;
use crate::identity::{LABEL_CONFIG_HASH, LABEL_NUMBER, LABEL_ONE_OFF, LABEL_PROJECT, LABEL_SERVICE};
use std::collections::HashMap;

/// Handle to one engine container with decoded identity labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub project: String,
    pub service: String,
    /// Instance number; `None` for containers created outside the numbering
    /// scheme (they still belong to the service for cleanup purposes).
    pub number: Option<u32>,
    pub one_off: bool,
    /// Fingerprint of the configuration used to create the container.
    pub config_hash: Option<String>,
    pub labels: HashMap<String, String>,
}

impl ContainerRecord {
    /// Decode a listing entry. Returns `None` for containers that don't
    /// carry the project identity label (not managed by this core).
    pub fn from_summary(summary: ContainerSummary) -> Option<Self> {
        let project = summary.labels.get(LABEL_PROJECT)?.clone();
        let service = summary.labels.get(LABEL_SERVICE)?.clone();
        let number = summary
            .labels
            .get(LABEL_NUMBER)
            .and_then(|n| n.parse().ok());
        let one_off = summary
            .labels
            .get(LABEL_ONE_OFF)
            .map(|v| v == "true")
            .unwrap_or(false);
        let config_hash = summary.labels.get(LABEL_CONFIG_HASH).cloned();
        Some(ContainerRecord {
            id: summary.id,
            name: summary.name,
            running: summary.running,
            project,
            service,
            number,
            one_off,
            config_hash,
            labels: summary.labels,
        })
    }

    /// Engine-style short id (first 12 characters).
    pub fn short_id(&self) -> &str {
        if self.id.len() > 12 {
            &self.id[..12]
        } else {
            &self.id
        }
    }

    /// `{service}_{number}` label used in per-unit failure reports.
    pub fn instance_label(&self) -> String {
        match self.number {
            Some(n) => format!("{}_{}", self.service, n),
            None => self.name.clone(),
        }
    }
}

/// Listing filter knobs, mirroring the two axes the planner and scaler
/// slice on: running/stopped state and the one-off numbering stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Include stopped containers.
    pub stopped: bool,
    /// List the one-off stream instead of regular instances.
    pub one_off: bool,
}

impl ListOptions {
    pub fn all() -> Self {
        ListOptions {
            stopped: true,
            one_off: false,
        }
    }
}

/// List a service's containers by identity labels, sorted by instance
/// number. The sole source of truth consulted by the planner and the
/// scaling controller; every call hits the engine.
pub async fn list_containers(
    engine: &dyn EngineClient,
    project: &str,
    service: &str,
    opts: ListOptions,
) -> Result<Vec<ContainerRecord>> {
    let one_off = if opts.one_off { "true" } else { "false" };
    let filters = [
        (LABEL_PROJECT, project),
        (LABEL_SERVICE, service),
        (LABEL_ONE_OFF, one_off),
    ];
    let summaries = engine.list(&filters).await?;
    let mut records: Vec<ContainerRecord> = summaries
        .into_iter()
        .filter_map(ContainerRecord::from_summary)
        .filter(|record| opts.stopped || record.running)
        .collect();
    records.sort_by_key(|record| record.number.unwrap_or(u32::MAX));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LABEL_VERSION;

    fn summary(labels: &[(&str, &str)]) -> ContainerSummary {
        ContainerSummary {
            id: "0123456789abcdef".to_string(),
            name: "proj_web_1".to_string(),
            running: true,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn decodes_identity_labels() {
        let record = ContainerRecord::from_summary(summary(&[
            (LABEL_PROJECT, "proj"),
            (LABEL_SERVICE, "web"),
            (LABEL_NUMBER, "1"),
            (LABEL_ONE_OFF, "false"),
            (LABEL_CONFIG_HASH, "abc123"),
            (LABEL_VERSION, "0.3.1"),
        ]))
        .unwrap();
        assert_eq!(record.project, "proj");
        assert_eq!(record.service, "web");
        assert_eq!(record.number, Some(1));
        assert!(!record.one_off);
        assert_eq!(record.config_hash.as_deref(), Some("abc123"));
        assert_eq!(record.instance_label(), "web_1");
    }

    #[test]
    fn unmanaged_containers_are_skipped() {
        assert!(ContainerRecord::from_summary(summary(&[("some.other.label", "x")])).is_none());
    }

    #[test]
    fn short_id_truncates_to_twelve() {
        let record = ContainerRecord::from_summary(summary(&[
            (LABEL_PROJECT, "proj"),
            (LABEL_SERVICE, "web"),
        ]))
        .unwrap();
        assert_eq!(record.short_id(), "0123456789ab");
    }
}
