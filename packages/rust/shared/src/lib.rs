//! Shared types, error model, and configuration for conductor.
//!
//! This crate is the foundation depended on by all other conductor crates.
//! It provides:
//! - [`ConductorError`] and the [`FailureKind`] taxonomy
//! - Execution types ([`ExecutionResult`], [`WorkflowStep`], [`UnitOutput`])
//! - Collection types ([`CollectionPlan`], [`Record`], [`CollectionResult`],
//!   [`EntityMention`], [`CanonicalEntity`])
//! - Configuration ([`AppConfig`], [`CoordinatorConfig`], [`CollectionConfig`], config loading)

pub mod config;
pub mod error;
pub mod plan;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CollectionConfig, CollectionSection, CoordinatorConfig, DefaultsConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ConductorError, FailureKind, Result};
pub use plan::{
    CanonicalEntity, CollectionPlan, CollectionResult, EnrichmentLevel, EntityMention, Frequency,
    QualityThresholds, Record,
};
pub use types::{ExecutionResult, UNKNOWN_UNIT_ID, UnitOutput, WorkflowStep};
