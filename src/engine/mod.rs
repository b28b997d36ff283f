//! Container engine client contract.
//!
//! The convergence core never talks to an engine directly; everything goes
//! through the [`EngineClient`] trait so tests can substitute an in-memory
//! engine and production code can use the Docker CLI implementation in
//! [`docker`].

pub mod docker;
pub mod error;

pub use docker::DockerEngine;
pub use error::EngineError;

use crate::materialize::CreateParams;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// One entry from an engine container listing: enough to decode identity
/// labels and running state without a follow-up inspect call.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
}

/// Detailed container state from an inspect call.
///
/// `volumes` maps container path to the live host source (bind path or
/// engine-managed volume directory), including volumes declared by the image
/// itself. That map is what a recreate snapshots to preserve data.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
    pub volumes: BTreeMap<String, String>,
}

/// The runtime client contract consumed by the core.
///
/// Calls are blocking and retryless at this layer: transient engine errors
/// surface to the caller (isolated per instance during scaling), never
/// retried automatically.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// List all containers (running and stopped) whose labels match every
    /// `(key, value)` filter pair.
    async fn list(&self, label_filters: &[(&str, &str)])
        -> Result<Vec<ContainerSummary>, EngineError>;

    /// Create a container from materialized parameters without starting it.
    /// Returns the engine-assigned container id. Fails with
    /// [`EngineError::NameConflict`] if the name is taken.
    async fn create(&self, params: &CreateParams) -> Result<String, EngineError>;

    /// Start a created or stopped container.
    async fn start(&self, id: &str) -> Result<(), EngineError>;

    /// Stop a running container, giving it `grace` to exit before the engine
    /// kills it. Exceeding the overall RPC deadline surfaces as
    /// [`EngineError::Timeout`]; callers escalate to [`EngineClient::kill`].
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError>;

    /// Kill a container (SIGKILL). Already-stopped containers are not an error.
    async fn kill(&self, id: &str) -> Result<(), EngineError>;

    /// Remove a stopped container.
    async fn remove(&self, id: &str) -> Result<(), EngineError>;

    /// Rename a container, freeing its old name slot.
    async fn rename(&self, id: &str, new_name: &str) -> Result<(), EngineError>;

    /// Inspect a container's detailed state, including live volume bindings.
    async fn inspect(&self, id: &str) -> Result<ContainerDetails, EngineError>;

    /// Check whether a usable image exists locally.
    async fn image_exists(&self, image: &str) -> Result<bool, EngineError>;

    /// Build an image from a build context and tag it. Invoked only when no
    /// usable image exists.
    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), EngineError>;
}
