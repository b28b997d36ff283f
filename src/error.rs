use crate::engine::EngineError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(converge::config::error),
        help("Fix the offending field in the service definition")
    )]
    Config(String),

    #[error("Engine error: {0}")]
    #[diagnostic(
        code(converge::engine::error),
        help("Check that the container engine is running with `docker ps`")
    )]
    Engine(#[from] EngineError),

    #[error("Container not found: {0}")]
    #[diagnostic(code(converge::container::not_found))]
    NotFound(String),

    #[error("Service '{0}' has no image and no build context")]
    #[diagnostic(
        code(converge::service::no_image),
        help("Declare either `image:` or `build:` for the service")
    )]
    NoImage(String),

    #[error("Image build failed for '{service}': {reason}")]
    #[diagnostic(code(converge::service::build_failed))]
    BuildFailed { service: String, reason: String },

    #[error("Policy violation: {0}")]
    #[diagnostic(code(converge::policy::violation))]
    Policy(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Configuration error naming the offending field.
    pub fn config_field(field: &str, reason: impl std::fmt::Display) -> Self {
        Error::Config(format!("{}: {}", field, reason))
    }
}
