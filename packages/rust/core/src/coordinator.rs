//! The coordinator: runs workflow steps against a unit registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use conductor_shared::{
    ConductorError, CoordinatorConfig, ExecutionResult, FailureKind, WorkflowStep,
};

use crate::envelope::{catch_panic, invoke_unit};
use crate::history::ExecutionHistory;
use crate::parallel::fan_out;
use crate::summary::ExecutionSummary;
use crate::unit::UnitRegistry;

/// Runs steps sequentially or with bounded parallelism and records every
/// result in an append-only history.
///
/// The registry is read-only after construction; the history is the only
/// mutable shared state.
pub struct Coordinator {
    units: Arc<UnitRegistry>,
    history: Arc<ExecutionHistory>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(units: UnitRegistry, config: CoordinatorConfig) -> Self {
        Self {
            units: Arc::new(units),
            history: Arc::new(ExecutionHistory::new()),
            config,
        }
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run `steps` in list order.
    ///
    /// With `stop_on_failure`, the first failed result ends the run; later
    /// steps are neither attempted nor reported.
    #[instrument(skip_all, fields(steps = steps.len(), stop_on_failure = stop_on_failure))]
    pub async fn run_sequential(
        &self,
        steps: &[WorkflowStep],
        stop_on_failure: bool,
    ) -> Vec<ExecutionResult> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let result = execute_step(&self.units, step, self.config.unit_timeout).await;
            let failed = !result.success;

            self.history.append(result.clone());
            results.push(result);

            if failed && stop_on_failure {
                warn!(
                    index,
                    unit_id = %step.unit_id,
                    skipped = steps.len() - index - 1,
                    "stopping sequential run after failure"
                );
                break;
            }
        }

        log_run_finished("sequential", &results, started);
        results
    }

    /// Run every step with at most `max_concurrent` invocations in flight.
    ///
    /// All steps are attempted. `result[i]` corresponds to `steps[i]`
    /// regardless of completion order. History appends happen as steps
    /// finish, so their relative order is unspecified.
    #[instrument(skip_all, fields(steps = steps.len(), max_concurrent = max_concurrent))]
    pub async fn run_parallel(
        &self,
        steps: &[WorkflowStep],
        max_concurrent: usize,
    ) -> Vec<ExecutionResult> {
        let started = Instant::now();
        if max_concurrent == 0 {
            warn!("max_concurrent of 0 clamped to 1");
        }

        let unit_ids: Vec<String> = steps.iter().map(|s| s.unit_id.clone()).collect();
        let units = Arc::clone(&self.units);
        let history = Arc::clone(&self.history);
        let default_timeout = self.config.unit_timeout;

        let results = fan_out(
            steps.to_vec(),
            max_concurrent,
            move |step: WorkflowStep| {
                let units = Arc::clone(&units);
                let history = Arc::clone(&history);
                async move {
                    let result = execute_step(&units, &step, default_timeout).await;
                    history.append(result.clone());
                    result
                }
            },
            |index, reason| {
                let error = ConductorError::Scheduling(reason);
                let result = ExecutionResult::from_error(&unit_ids[index], &error, 0.0);
                self.history.append(result.clone());
                result
            },
        )
        .await;

        log_run_finished("parallel", &results, started);
        results
    }

    /// Sequential run using the configured stop-on-failure default.
    pub async fn run_sequential_default(&self, steps: &[WorkflowStep]) -> Vec<ExecutionResult> {
        self.run_sequential(steps, self.config.stop_on_failure).await
    }

    /// Parallel run using the configured admission limit.
    pub async fn run_parallel_default(&self, steps: &[WorkflowStep]) -> Vec<ExecutionResult> {
        self.run_parallel(steps, self.config.max_concurrent).await
    }

    /// Totals, success rate and per-unit stats across every run so far.
    pub fn get_summary(&self) -> ExecutionSummary {
        self.history.summary()
    }

    /// Every recorded result, oldest first.
    pub fn history(&self) -> Vec<ExecutionResult> {
        self.history.snapshot()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }
}

/// Resolve the step's unit and invoke it, or synthesize a not-found result.
async fn execute_step(
    units: &UnitRegistry,
    step: &WorkflowStep,
    default_timeout: Duration,
) -> ExecutionResult {
    let Some(unit) = units.get(&step.unit_id) else {
        warn!(unit_id = %step.unit_id, "unit not registered");
        let error = ConductorError::UnitNotFound {
            unit_id: step.unit_id.clone(),
        };
        return ExecutionResult::from_error(&step.unit_id, &error, 0.0);
    };

    let deadline = match step.timeout_ms {
        Some(ms) => Duration::from_millis(ms),
        None => match catch_panic(|| unit.timeout()) {
            Ok(timeout) => timeout.unwrap_or(default_timeout),
            Err(e) => {
                warn!(unit_id = %step.unit_id, error = %e, "unit timeout lookup failed");
                return ExecutionResult::from_error(&step.unit_id, &e, 0.0);
            }
        },
    };

    invoke_unit(unit.as_ref(), &step.parameters, deadline).await
}

fn log_run_finished(mode: &str, results: &[ExecutionResult], started: Instant) {
    let failed = results.iter().filter(|r| !r.success).count();
    let timeouts = results
        .iter()
        .filter(|r| r.error_kind == Some(FailureKind::Timeout))
        .count();
    info!(
        mode,
        steps = results.len(),
        succeeded = results.len() - failed,
        failed,
        timeouts,
        duration_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );
}
