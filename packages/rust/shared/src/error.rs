//! Error types for conductor.
//!
//! Library crates use [`ConductorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Unit and collector failures never surface to callers as `Err`: the
//! orchestration layer folds them into result records tagged with a
//! [`FailureKind`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all conductor operations.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A step referenced a unit id that is not registered.
    #[error("unit '{unit_id}' is not registered")]
    UnitNotFound { unit_id: String },

    /// An invocation exceeded its deadline.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A unit or collector failed while running.
    #[error("unit fault: {0}")]
    UnitFault(String),

    /// The concurrency layer itself failed (join error, closed semaphore).
    #[error("scheduling fault: {0}")]
    Scheduling(String),

    /// Malformed input data (plan files, record files).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad window, out-of-range threshold, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ConductorError>;

impl ConductorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a unit fault from any displayable message.
    pub fn unit_fault(msg: impl Into<String>) -> Self {
        Self::UnitFault(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for result records.
    ///
    /// Anything raised from inside a unit that is not a deadline or a
    /// registry miss counts as a [`FailureKind::UnitFault`].
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::UnitNotFound { .. } => FailureKind::UnitNotFound,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Scheduling(_) => FailureKind::SchedulingFault,
            _ => FailureKind::UnitFault,
        }
    }
}

/// Why an invocation failed. Every variant is recovered locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No unit registered under the requested id; nothing was invoked.
    UnitNotFound,
    /// The per-invocation deadline elapsed.
    Timeout,
    /// The unit returned an error or panicked.
    UnitFault,
    /// The task could not be scheduled or joined.
    SchedulingFault,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnitNotFound => "unit_not_found",
            Self::Timeout => "timeout",
            Self::UnitFault => "unit_fault",
            Self::SchedulingFault => "scheduling_fault",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
