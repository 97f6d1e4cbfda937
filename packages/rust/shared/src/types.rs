//! Execution types shared by the coordinator and its callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConductorError, FailureKind};

/// Id recorded on a result when the step named no unit at all.
pub const UNKNOWN_UNIT_ID: &str = "unknown";

fn unit_id_or_unknown(unit_id: &str) -> String {
    if unit_id.trim().is_empty() {
        UNKNOWN_UNIT_ID.to_string()
    } else {
        unit_id.to_string()
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// One invocation request: which unit to call and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Registry id of the unit to invoke (exact, case-sensitive match).
    pub unit_id: String,
    /// Parameters handed to the unit verbatim.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Overrides the unit's and the coordinator's default deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl WorkflowStep {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            parameters: Map::new(),
            timeout_ms: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

// ---------------------------------------------------------------------------
// UnitOutput
// ---------------------------------------------------------------------------

/// What a unit hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOutput {
    pub payload: Value,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl UnitOutput {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// The outcome of one unit invocation.
///
/// Construct through [`ExecutionResult::success`] or
/// [`ExecutionResult::failure`]; both keep `success == payload.is_some()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Unit the step targeted; `"unknown"` when the step named none.
    pub unit_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Wall-clock time spent in the invocation.
    pub duration_ms: f64,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// A successful invocation carrying the unit's output.
    pub fn success(unit_id: &str, output: UnitOutput, duration_ms: f64) -> Self {
        Self {
            unit_id: unit_id_or_unknown(unit_id),
            success: true,
            payload: Some(output.payload),
            error: None,
            error_kind: None,
            warnings: output.warnings,
            metadata: output.metadata,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// A failed invocation. The payload is always empty.
    pub fn failure(
        unit_id: &str,
        kind: FailureKind,
        error: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        Self {
            unit_id: unit_id_or_unknown(unit_id),
            success: false,
            payload: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            warnings: Vec::new(),
            metadata: Map::new(),
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// A failed invocation classified from a [`ConductorError`].
    pub fn from_error(unit_id: &str, error: &ConductorError, duration_ms: f64) -> Self {
        Self::failure(unit_id, error.failure_kind(), error.to_string(), duration_ms)
    }

    /// Attach a metadata entry, replacing any previous value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
