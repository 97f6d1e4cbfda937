//! Quality gate: threshold-based record admission.

use chrono::{DateTime, Utc};
use serde::Serialize;

use conductor_shared::{QualityThresholds, Record};

/// Outcome of evaluating one record. Rejections name the first failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Admit,
    Quality,
    Completeness,
    Age,
}

impl GateDecision {
    pub fn is_admit(self) -> bool {
        self == GateDecision::Admit
    }
}

/// A stateless filter over records. Never mutates what it inspects.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, record: &Record, now: DateTime<Utc>) -> GateDecision {
        let t = &self.thresholds;
        if let Some(min) = t.min_quality {
            if below(record.quality_score, min) {
                return GateDecision::Quality;
            }
        }
        if let Some(min) = t.min_completeness {
            if below(record.completeness, min) {
                return GateDecision::Completeness;
            }
        }
        if let Some(max) = t.max_age_hours {
            if below(max, record.age_hours(now)) {
                return GateDecision::Age;
            }
        }
        GateDecision::Admit
    }

    pub fn admits(&self, record: &Record, now: DateTime<Utc>) -> bool {
        self.evaluate(record, now).is_admit()
    }

    /// Split `records` into the admitted ones, in input order, and a count of
    /// the rejected ones.
    pub fn filter(&self, records: Vec<Record>, now: DateTime<Utc>) -> (Vec<Record>, usize) {
        let total = records.len();
        let admitted: Vec<Record> = records
            .into_iter()
            .filter(|r| self.admits(r, now))
            .collect();
        let rejected = total - admitted.len();
        (admitted, rejected)
    }
}

/// `value < min`, with NaN on either side counting as below.
fn below(value: f64, min: f64) -> bool {
    value.is_nan() || min.is_nan() || value < min
}
