use std::fmt;
use std::time::Duration;

/// Structured error type for container engine operations.
///
/// Machine-actionable variants so callers can distinguish "the container is
/// gone" from "the engine rejected the call" from "the engine never answered".
#[derive(Debug)]
pub enum EngineError {
    /// Engine command timed out.
    Timeout { command: String, timeout: Duration },

    /// Engine command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Engine binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// Container doesn't exist (parsed from "No such container" stderr).
    ContainerNotFound { container: String },

    /// A container with the requested name already exists.
    NameConflict { name: String },

    /// Engine daemon not responding.
    DaemonUnavailable,
}

impl EngineError {
    /// Create a timeout error.
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        EngineError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from an `std::process::Output`, mapping
    /// well-known stderr patterns to their structured variants.
    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("Cannot connect to the Docker daemon")
            || stderr.contains("Is the docker daemon running")
        {
            return EngineError::DaemonUnavailable;
        }
        if stderr.contains("No such container") {
            let container = stderr
                .rsplit(':')
                .next()
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            return EngineError::ContainerNotFound { container };
        }
        if stderr.contains("is already in use") {
            // docker: Conflict. The container name "/web_1" is already in use...
            let name = stderr
                .split('"')
                .nth(1)
                .map(|s| s.trim_start_matches('/').to_string())
                .unwrap_or_default();
            return EngineError::NameConflict { name };
        }
        EngineError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }

    /// Create a command-failed error from a stderr string and optional exit code.
    pub fn cmd_failed(
        cmd: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        EngineError::CommandFailed {
            command: cmd.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Create an exec-failed error (binary not found / permission denied).
    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        EngineError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    /// True if the container (or link target) this call operated on is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::ContainerNotFound { .. })
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            EngineError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            EngineError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            EngineError::ContainerNotFound { container } => {
                write!(f, "No such container: {}", container)
            }
            EngineError::NameConflict { name } => {
                write!(f, "Container name '{}' is already in use", name)
            }
            EngineError::DaemonUnavailable => {
                write!(f, "Container engine daemon is not responding")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
