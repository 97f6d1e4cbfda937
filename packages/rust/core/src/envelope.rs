//! Execution envelope: deadline enforcement and fault capture around a unit call.
//!
//! Callers always get a well-formed [`ExecutionResult`] back. Timeouts,
//! returned errors and panics inside the unit are all folded into a failed
//! result; nothing propagates.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use conductor_shared::{ConductorError, ExecutionResult, Result, UNKNOWN_UNIT_ID};

use crate::unit::Unit;

/// Await `fut` for at most `deadline`.
///
/// On expiry the future is dropped and [`ConductorError::Timeout`] returned;
/// a panic inside `fut` becomes [`ConductorError::UnitFault`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(ConductorError::unit_fault(format!(
            "panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_elapsed) => Err(ConductorError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}

/// Run a synchronous plugin hook, turning a panic into
/// [`ConductorError::UnitFault`].
pub fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        ConductorError::unit_fault(format!("panicked: {}", panic_message(panic.as_ref())))
    })
}

/// Invoke `unit` under `deadline` and stamp the outcome.
pub async fn invoke_unit(
    unit: &dyn Unit,
    params: &Map<String, Value>,
    deadline: Duration,
) -> ExecutionResult {
    let attempted_at = Utc::now();
    let unit_id = match catch_panic(|| unit.id().to_string()) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "unit id lookup failed");
            return ExecutionResult::from_error(UNKNOWN_UNIT_ID, &e, 0.0)
                .with_metadata("attempted_at", attempted_at.to_rfc3339());
        }
    };
    let unit_id = unit_id.as_str();
    let started = Instant::now();

    let outcome = match catch_panic(|| unit.process(params)) {
        Ok(fut) => with_deadline(deadline, fut).await,
        Err(e) => Err(e),
    };
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    let result = match outcome {
        Ok(output) => {
            debug!(unit_id, duration_ms, "unit succeeded");
            ExecutionResult::success(unit_id, output, duration_ms)
        }
        Err(e) => {
            warn!(unit_id, duration_ms, kind = %e.failure_kind(), error = %e, "unit failed");
            ExecutionResult::from_error(unit_id, &e, duration_ms)
        }
    };

    result.with_metadata("attempted_at", attempted_at.to_rfc3339())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
