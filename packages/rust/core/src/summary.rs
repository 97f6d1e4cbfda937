//! Summary statistics over execution results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use conductor_shared::{ExecutionResult, FailureKind};

/// Running statistics for one unit id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub count: usize,
    pub success_count: usize,
    /// Running mean of `duration_ms`, updated without keeping samples.
    pub avg_time_ms: f64,
}

impl UnitStats {
    /// Fold one more observation into the stats.
    pub fn record(&mut self, duration_ms: f64, success: bool) {
        self.count += 1;
        if success {
            self.success_count += 1;
        }
        let n = self.count as f64;
        self.avg_time_ms = (self.avg_time_ms * (n - 1.0) + duration_ms) / n;
    }

    pub fn success_rate(&self) -> f64 {
        ratio(self.success_count, self.count)
    }
}

/// JSON-serializable roll-up of an execution history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_runs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// `success_count / total_runs`; `0.0` for an empty history.
    pub success_rate: f64,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    pub per_unit_stats: BTreeMap<String, UnitStats>,
}

impl ExecutionSummary {
    /// Fold one result into the summary.
    pub fn record(&mut self, result: &ExecutionResult) {
        self.total_runs += 1;
        if result.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
            if let Some(kind) = result.error_kind {
                *self.failures_by_kind.entry(kind).or_default() += 1;
            }
        }
        self.success_rate = ratio(self.success_count, self.total_runs);
        self.per_unit_stats
            .entry(result.unit_id.clone())
            .or_default()
            .record(result.duration_ms, result.success);
    }

    /// Summarize a batch of results, e.g. the output of a single run.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ExecutionResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result);
        }
        summary
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
