//! Plan file format.
//!
//! ```toml
//! [plan]
//! window_start = "2026-10-17T00:00:00Z"
//! window_end = "2026-10-18T00:00:00Z"
//! enrichment_level = "full"
//!
//! [plan.quality_thresholds]
//! min_quality = 0.6
//!
//! [[sources]]
//! id = "ais"
//! path = "data/ais.json"
//! ```
//!
//! Source paths are resolved relative to the plan file. Sources run in the
//! order listed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use conductor_shared::{
    CollectionPlan, ConductorError, EnrichmentLevel, Frequency, QualityThresholds, Result,
};

#[derive(Debug, Deserialize)]
struct PlanFile {
    plan: PlanSection,
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct PlanSection {
    #[serde(default)]
    plan_id: Option<String>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    #[serde(default)]
    frequency: Frequency,
    #[serde(default)]
    enrichment_level: EnrichmentLevel,
    #[serde(default)]
    quality_thresholds: QualityThresholds,
}

/// One file-backed source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct SourceEntry {
    pub id: String,
    pub path: PathBuf,
}

/// A validated plan plus where to read each source from.
#[derive(Debug)]
pub(crate) struct LoadedPlan {
    pub plan: CollectionPlan,
    pub sources: Vec<SourceEntry>,
}

/// Read and validate a plan file from disk.
pub(crate) fn load_plan(path: &Path) -> Result<LoadedPlan> {
    let content = std::fs::read_to_string(path).map_err(|e| ConductorError::io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_plan(&content, base)
        .map_err(|e| ConductorError::parse(format!("{}: {e}", path.display())))
}

/// Parse plan TOML, resolving relative source paths against `base`.
pub(crate) fn parse_plan(content: &str, base: &Path) -> Result<LoadedPlan> {
    let file: PlanFile =
        toml::from_str(content).map_err(|e| ConductorError::parse(e.to_string()))?;

    if file.sources.is_empty() {
        return Err(ConductorError::validation("plan lists no [[sources]]"));
    }

    let sources: Vec<SourceEntry> = file
        .sources
        .into_iter()
        .map(|s| SourceEntry {
            path: if s.path.is_absolute() {
                s.path
            } else {
                base.join(s.path)
            },
            id: s.id,
        })
        .collect();

    let section = file.plan;
    let mut plan = CollectionPlan::new(
        section.window_start,
        section.window_end,
        sources.iter().map(|s| s.id.clone()),
    );
    if let Some(plan_id) = section.plan_id {
        plan.plan_id = plan_id;
    }
    plan.frequency = section.frequency;
    plan.enrichment_level = section.enrichment_level;
    plan.quality_thresholds = section.quality_thresholds;
    plan.validate()?;

    Ok(LoadedPlan { plan, sources })
}
