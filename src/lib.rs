//! Container convergence and scaling core.
//!
//! Keeps a set of named service definitions converged with live container
//! state on a single engine host. Identity is label-driven and fully
//! stateless: every planning pass re-derives project membership, instance
//! numbers and configuration fingerprints from engine-visible labels, so
//! the core survives restarts without any local bookkeeping.
//!
//! The main entry point is [`Service`]: construct one per named service,
//! then [`Service::converge`] to reconcile state, [`Service::scale`] to
//! change the instance count, or [`Service::plan`] to inspect what a
//! reconcile would do without touching the engine.

pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod identity;
pub mod links;
pub mod materialize;
pub mod service;

pub use config::ServiceDefinition;
pub use container::{list_containers, ContainerRecord, ListOptions};
pub use engine::{ContainerDetails, ContainerSummary, DockerEngine, EngineClient, EngineError};
pub use error::{Error, Result};
pub use links::LinkAlias;
pub use materialize::{CreateOptions, CreateParams, Materializer};
pub use service::{
    ConvergenceAction, ConvergencePlan, ScaleFailure, ScaleReport, Service,
    DEFAULT_SCALE_WORKERS, DEFAULT_STOP_GRACE,
};
