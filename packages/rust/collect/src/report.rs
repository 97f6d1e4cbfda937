//! Plan-level roll-up of per-source results.

use serde::Serialize;

use crate::executor::PlanOutcome;

/// Aggregate view of one plan run, suitable for printing or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub plan_id: String,
    pub sources_total: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub records_collected: usize,
    pub records_admitted: usize,
    /// `records_admitted / records_collected`; `0.0` when nothing was collected.
    pub admission_rate: f64,
    /// Mean quality over every admitted record across all sources.
    pub avg_quality: f64,
    /// Sum of per-source durations.
    pub total_duration_s: f64,
    /// Longest single source; the plan's critical path.
    pub max_duration_s: f64,
    pub canonical_entities: usize,
    /// `(source_id, message)` for every recorded error.
    pub errors: Vec<(String, String)>,
}

impl CollectionReport {
    pub fn from_outcome(outcome: &PlanOutcome) -> Self {
        let results = &outcome.results;

        let sources_succeeded = results.iter().filter(|r| r.succeeded).count();
        let records_collected: usize = results.iter().map(|r| r.records_collected).sum();
        let records_admitted: usize = results.iter().map(|r| r.records_admitted).sum();
        let quality_weight: f64 = results
            .iter()
            .map(|r| r.avg_quality * r.records_admitted as f64)
            .sum();

        let errors = results
            .iter()
            .flat_map(|r| r.errors.iter().map(|e| (r.source_id.clone(), e.clone())))
            .collect();

        Self {
            plan_id: outcome.plan_id.clone(),
            sources_total: results.len(),
            sources_succeeded,
            sources_failed: results.len() - sources_succeeded,
            records_collected,
            records_admitted,
            admission_rate: ratio(records_admitted as f64, records_collected),
            avg_quality: ratio(quality_weight, records_admitted),
            total_duration_s: results.iter().map(|r| r.duration_s).sum(),
            max_duration_s: results.iter().map(|r| r.duration_s).fold(0.0, f64::max),
            canonical_entities: outcome.entities.len(),
            errors,
        }
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use conductor_shared::{CanonicalEntity, CollectionResult};

    use super::*;

    fn ok(source_id: &str, collected: usize, admitted: usize, avg_quality: f64, duration_s: f64) -> CollectionResult {
        CollectionResult {
            plan_id: "p".into(),
            source_id: source_id.into(),
            succeeded: true,
            records_collected: collected,
            records_admitted: admitted,
            avg_quality,
            semantic_coverage_pct: 0.0,
            duration_s,
            errors: Vec::new(),
        }
    }

    #[test]
    fn aggregates_sources() {
        let outcome = PlanOutcome {
            plan_id: "p".into(),
            results: vec![
                ok("ais", 10, 8, 0.5, 2.0),
                ok("sar", 4, 2, 0.8, 3.5),
                CollectionResult::failed("p", "rf", 0.5, "connection reset"),
            ],
            entities: vec![CanonicalEntity {
                entity_type: "vessel".into(),
                canonical_form: "X".into(),
                confidence: 0.9,
                contributing_sources: vec!["ais".into(), "sar".into()],
                mention_count: 2,
            }],
        };

        let report = CollectionReport::from_outcome(&outcome);
        assert_eq!(report.sources_total, 3);
        assert_eq!(report.sources_succeeded, 2);
        assert_eq!(report.sources_failed, 1);
        assert_eq!(report.records_collected, 14);
        assert_eq!(report.records_admitted, 10);
        assert!((report.admission_rate - 10.0 / 14.0).abs() < 1e-9);
        assert!((report.avg_quality - 0.56).abs() < 1e-9);
        assert_eq!(report.total_duration_s, 6.0);
        assert_eq!(report.max_duration_s, 3.5);
        assert_eq!(report.canonical_entities, 1);
        assert_eq!(
            report.errors,
            vec![("rf".to_string(), "connection reset".to_string())]
        );
    }

    #[test]
    fn empty_outcome_has_zero_rates() {
        let outcome = PlanOutcome {
            plan_id: "p".into(),
            results: Vec::new(),
            entities: Vec::new(),
        };
        let report = CollectionReport::from_outcome(&outcome);
        assert_eq!(report.admission_rate, 0.0);
        assert_eq!(report.avg_quality, 0.0);
        assert_eq!(report.max_duration_s, 0.0);
    }
}
