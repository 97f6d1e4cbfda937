//! Append-only execution history shared by concurrently running steps.
//!
//! Guarded by a `std::sync::Mutex`: appends are short, synchronous and never
//! held across an `.await`, so contention is limited to the bookkeeping
//! itself even at high `max_concurrent`.

use std::sync::{Mutex, MutexGuard};

use conductor_shared::ExecutionResult;

use crate::summary::ExecutionSummary;

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<ExecutionResult>,
    summary: ExecutionSummary,
}

/// Every result from every run, in append order, plus incremental stats.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    state: Mutex<HistoryState>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, result: ExecutionResult) {
        let mut state = self.lock();
        state.summary.record(&result);
        state.entries.push(result);
    }

    /// Copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<ExecutionResult> {
        self.lock().entries.clone()
    }

    pub fn summary(&self) -> ExecutionSummary {
        self.lock().summary.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.summary = ExecutionSummary::default();
    }
}
