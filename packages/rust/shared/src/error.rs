//! Error types for htmlcombine.
//!
//! Library crates use [`CombineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all htmlcombine operations.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed manifest, empty pipeline list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The same participant handle was registered twice, usually because one
    /// plugin instance was shared between two build pipelines.
    #[error(
        "participant '{participant}' is already registered in group {group}; \
         create a separate plugin instance for each build pipeline"
    )]
    DuplicateParticipant { participant: String, group: String },

    /// A participant tried to contribute a second time.
    #[error("participant '{participant}' already contributed to group {group}")]
    AlreadyContributed { participant: String, group: String },

    /// A participant contributed without having registered first.
    #[error(
        "participant '{participant}' contributed to group {group} without registering; \
         the pipeline-start hook must run before the draft-output hook"
    )]
    UnknownParticipant { participant: String, group: String },

    /// The host build system does not expose the lifecycle hooks we need.
    #[error("host '{host}' is not supported: missing {missing} hook")]
    UnsupportedHost { host: String, missing: String },

    /// A build pipeline stopped before reaching its draft output.
    #[error("pipeline '{pipeline}' aborted before producing a draft output")]
    PipelineAborted { pipeline: String },

    /// Some participants never contributed within the configured timeout.
    #[error(
        "barrier for group {group} stranded after {waited_ms}ms; still waiting on: {}",
        pending.join(", ")
    )]
    StrandedBarrier {
        group: String,
        pending: Vec<String>,
        waited_ms: u64,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CombineError>;

impl CombineError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unsupported-host error naming the missing hook.
    pub fn unsupported_host(host: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::UnsupportedHost {
            host: host.into(),
            missing: missing.into(),
        }
    }
}
