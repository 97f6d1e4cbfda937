//! Collection plan, record, and entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ConductorError, Result};

// ---------------------------------------------------------------------------
// CollectionPlan
// ---------------------------------------------------------------------------

/// How often the caller intends to re-run a plan. Scheduling itself happens
/// outside conductor; collectors may use the hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Once,
    Hourly,
    Daily,
    Weekly,
}

/// How much semantic annotation collectors should attach to records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentLevel {
    Basic,
    #[default]
    Standard,
    Full,
}

/// Admission thresholds applied by the quality gate.
///
/// A `None` field is not enforced; all `None` admits every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_completeness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_hours: Option<f64>,
}

impl QualityThresholds {
    pub fn new(min_quality: f64, min_completeness: f64, max_age_hours: f64) -> Self {
        Self {
            min_quality: Some(min_quality),
            min_completeness: Some(min_completeness),
            max_age_hours: Some(max_age_hours),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_quality.is_none() && self.min_completeness.is_none() && self.max_age_hours.is_none()
    }

    /// `self` if it sets anything, otherwise `fallback`.
    pub fn or(self, fallback: QualityThresholds) -> QualityThresholds {
        if self.is_empty() { fallback } else { self }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_quality", self.min_quality),
            ("min_completeness", self.min_completeness),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(ConductorError::validation(format!(
                        "{name} must be within [0, 1], got {v}"
                    )));
                }
            }
        }
        if let Some(hours) = self.max_age_hours {
            if hours.is_nan() || hours < 0.0 {
                return Err(ConductorError::validation(format!(
                    "max_age_hours must be non-negative, got {hours}"
                )));
            }
        }
        Ok(())
    }
}

/// A request to collect from a set of sources over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPlan {
    pub plan_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Sources to collect from, in priority order.
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub enrichment_level: EnrichmentLevel,
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,
}

impl CollectionPlan {
    /// Create a plan with a fresh time-sortable id and default settings.
    pub fn new(
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        source_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            plan_id: Uuid::now_v7().to_string(),
            window_start,
            window_end,
            source_ids: source_ids.into_iter().map(Into::into).collect(),
            frequency: Frequency::default(),
            enrichment_level: EnrichmentLevel::default(),
            quality_thresholds: QualityThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.quality_thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.plan_id.trim().is_empty() {
            return Err(ConductorError::validation("plan_id must not be empty"));
        }
        if self.window_start > self.window_end {
            return Err(ConductorError::validation(format!(
                "window_start {} is after window_end {}",
                self.window_start, self.window_end
            )));
        }
        self.quality_thresholds.validate()
    }
}

// ---------------------------------------------------------------------------
// Records and entities
// ---------------------------------------------------------------------------

/// A sighting of a real-world entity inside one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    /// Stamped by the plan executor with the producing source.
    #[serde(default)]
    pub source_id: String,
    /// Filled in by the plan executor when a collector leaves it empty.
    #[serde(default)]
    pub record_id: String,
    pub entity_type: String,
    pub canonical_form: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl EntityMention {
    pub fn new(
        source_id: impl Into<String>,
        record_id: impl Into<String>,
        entity_type: impl Into<String>,
        canonical_form: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            record_id: record_id.into(),
            entity_type: entity_type.into(),
            canonical_form: canonical_form.into(),
            confidence,
        }
    }
}

/// The merged representation of an entity seen by two or more mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub entity_type: String,
    pub canonical_form: String,
    /// Confidence of the representative (highest-confidence) mention.
    pub confidence: f64,
    /// Every source that mentioned the entity, first sighting first.
    pub contributing_sources: Vec<String>,
    pub mention_count: usize,
}

/// One item produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub quality_score: f64,
    pub completeness: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_mentions: Vec<EntityMention>,
    /// Source-specific body, passed through untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Record {
    pub fn new(
        record_id: impl Into<String>,
        quality_score: f64,
        completeness: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            quality_score,
            completeness,
            timestamp,
            entity_mentions: Vec::new(),
            data: Value::Null,
        }
    }

    pub fn with_mention(mut self, mention: EntityMention) -> Self {
        self.entity_mentions.push(mention);
        self
    }

    /// Hours elapsed between the record's timestamp and `now`.
    /// Negative for records stamped in the future.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 3_600_000.0
    }
}

// ---------------------------------------------------------------------------
// CollectionResult
// ---------------------------------------------------------------------------

/// Per-source outcome of a plan execution.
///
/// `records_admitted <= records_collected` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub plan_id: String,
    pub source_id: String,
    /// `false` when the collector faulted or timed out.
    pub succeeded: bool,
    pub records_collected: usize,
    pub records_admitted: usize,
    /// Mean quality score of admitted records; `0.0` when none were admitted.
    pub avg_quality: f64,
    /// Share of admitted records carrying at least one entity mention, in percent.
    pub semantic_coverage_pct: f64,
    pub duration_s: f64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CollectionResult {
    /// A source that produced nothing because its collector failed.
    pub fn failed(
        plan_id: impl Into<String>,
        source_id: impl Into<String>,
        duration_s: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            source_id: source_id.into(),
            succeeded: false,
            records_collected: 0,
            records_admitted: 0,
            avg_quality: 0.0,
            semantic_coverage_pct: 0.0,
            duration_s,
            errors: vec![error.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let end = Utc::now();
        (end - Duration::hours(24), end)
    }

    #[test]
    fn plan_ids_are_unique() {
        let (start, end) = window();
        let a = CollectionPlan::new(start, end, ["ais"]);
        let b = CollectionPlan::new(start, end, ["ais"]);
        assert_ne!(a.plan_id, b.plan_id);
        assert_eq!(a.source_ids, vec!["ais".to_string()]);
        assert!(a.quality_thresholds.is_empty());
    }

    #[test]
    fn plan_validation_rejects_inverted_window() {
        let (start, end) = window();
        let plan = CollectionPlan::new(end, start, ["ais"]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("is after"));
    }

    #[test]
    fn plan_validation_rejects_out_of_range_thresholds() {
        let (start, end) = window();
        let plan =
            CollectionPlan::new(start, end, ["ais"]).with_thresholds(QualityThresholds {
                min_quality: Some(1.5),
                ..QualityThresholds::default()
            });
        assert!(plan.validate().is_err());

        let plan = CollectionPlan::new(start, end, ["ais"])
            .with_thresholds(QualityThresholds::new(0.5, 0.5, -1.0));
        assert!(plan.validate().is_err());

        let plan = CollectionPlan::new(start, end, ["ais"])
            .with_thresholds(QualityThresholds::new(0.5, 0.5, 48.0));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn thresholds_fallback_only_when_empty() {
        let fallback = QualityThresholds::new(0.1, 0.1, 1.0);
        assert_eq!(QualityThresholds::default().or(fallback), fallback);

        let own = QualityThresholds {
            min_quality: Some(0.9),
            ..QualityThresholds::default()
        };
        assert_eq!(own.or(fallback), own);
    }

    #[test]
    fn plan_toml_roundtrip() {
        let toml_str = r#"
plan_id = "weekly-ports"
window_start = "2026-10-01T00:00:00Z"
window_end = "2026-10-08T00:00:00Z"
source_ids = ["ais", "port_calls"]
frequency = "weekly"
enrichment_level = "full"

[quality_thresholds]
min_quality = 0.6
max_age_hours = 168.0
"#;
        let plan: CollectionPlan = toml::from_str(toml_str).expect("parse plan");
        assert_eq!(plan.plan_id, "weekly-ports");
        assert_eq!(plan.frequency, Frequency::Weekly);
        assert_eq!(plan.enrichment_level, EnrichmentLevel::Full);
        assert_eq!(plan.quality_thresholds.min_quality, Some(0.6));
        assert_eq!(plan.quality_thresholds.min_completeness, None);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn record_age_hours() {
        let now = Utc::now();
        let record = Record::new("r1", 0.9, 0.9, now - Duration::minutes(90));
        assert!((record.age_hours(now) - 1.5).abs() < 1e-9);

        let future = Record::new("r2", 0.9, 0.9, now + Duration::hours(2));
        assert!(future.age_hours(now) < 0.0);
    }

    #[test]
    fn record_deserializes_without_optional_fields() {
        let json = r#"{
            "record_id": "r-7",
            "quality_score": 0.8,
            "completeness": 0.95,
            "timestamp": "2026-10-10T12:00:00Z"
        }"#;
        let record: Record = serde_json::from_str(json).expect("deserialize record");
        assert_eq!(record.record_id, "r-7");
        assert!(record.entity_mentions.is_empty());
        assert!(record.data.is_null());
    }

    #[test]
    fn failed_collection_result_is_empty() {
        let result = CollectionResult::failed("plan-1", "ais", 0.4, "connection refused");
        assert!(!result.succeeded);
        assert_eq!(result.records_collected, 0);
        assert_eq!(result.records_admitted, 0);
        assert_eq!(result.errors, vec!["connection refused".to_string()]);
    }
}
