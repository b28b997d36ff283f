//! Service configuration types.
//!
//! The core consumes an already-validated, normalized [`ServiceDefinition`]
//! per service; config-file discovery and schema validation are owned by
//! surrounding layers. Types here carry `serde` derives so callers can load
//! definitions from YAML or JSON documents.

pub mod env_loader;

mod service;

pub use service::*;
