//! Unit orchestration for conductor.
//!
//! This crate runs a registry of independent asynchronous units either
//! sequentially or with bounded parallelism, folds every failure into an
//! [`ExecutionResult`](conductor_shared::ExecutionResult), and keeps an
//! execution history for summary reporting.

pub mod coordinator;
pub mod envelope;
pub mod history;
pub mod parallel;
pub mod summary;
pub mod unit;

pub use coordinator::Coordinator;
pub use envelope::{catch_panic, invoke_unit, with_deadline};
pub use history::ExecutionHistory;
pub use parallel::fan_out;
pub use summary::{ExecutionSummary, UnitStats};
pub use unit::{Unit, UnitRegistry};
