//! Collection plan execution for conductor.
//!
//! A [`PlanExecutor`] runs one [`Collector`] per plan source with bounded
//! parallelism, admits records through a [`QualityGate`], and merges entity
//! mentions that several sources agree on via the [`EntityResolver`].

pub mod collector;
pub mod executor;
pub mod file;
pub mod gate;
pub mod report;
pub mod resolver;

pub use collector::{CollectionRequest, Collector, CollectorRegistry};
pub use executor::{PlanExecutor, PlanOutcome, PlanProgress, SilentProgress};
pub use file::JsonFileCollector;
pub use gate::{GateDecision, QualityGate};
pub use report::CollectionReport;
pub use resolver::EntityResolver;
