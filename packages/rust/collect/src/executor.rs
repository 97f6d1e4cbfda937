//! Collection plan executor.
//!
//! Runs one task per registered plan source through the shared fan-out
//! primitive, gates each source's records, feeds admitted mentions into a
//! per-run [`EntityResolver`], and resolves entities once every source has
//! finished. Source failures are recorded in their [`CollectionResult`] and
//! never abort siblings.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use conductor_core::{catch_panic, fan_out, with_deadline};
use conductor_shared::{
    CanonicalEntity, CollectionConfig, CollectionPlan, CollectionResult, ConductorError, Record,
};

use crate::collector::{CollectionRequest, Collector, CollectorRegistry};
use crate::gate::QualityGate;
use crate::resolver::EntityResolver;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for plan execution.
pub trait PlanProgress: Send + Sync {
    /// Called when a source task is admitted and its collector is about to run.
    fn source_started(&self, source_id: &str);
    /// Called as each source finishes, in completion order.
    fn source_finished(&self, result: &CollectionResult);
    /// Called once with the full outcome.
    fn done(&self, outcome: &PlanOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PlanProgress for SilentProgress {
    fn source_started(&self, _source_id: &str) {}
    fn source_finished(&self, _result: &CollectionResult) {}
    fn done(&self, _outcome: &PlanOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Everything a plan run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan_id: String,
    /// One entry per registered plan source, in plan order.
    pub results: Vec<CollectionResult>,
    pub entities: Vec<CanonicalEntity>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct PlanExecutor {
    collectors: Arc<CollectorRegistry>,
    config: CollectionConfig,
}

impl PlanExecutor {
    pub fn new(collectors: CollectorRegistry, config: CollectionConfig) -> Self {
        Self {
            collectors: Arc::new(collectors),
            config,
        }
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Execute `plan` without progress reporting.
    pub async fn execute_plan(&self, plan: &CollectionPlan) -> PlanOutcome {
        self.execute_plan_with_progress(plan, Arc::new(SilentProgress))
            .await
    }

    /// Execute `plan`, reporting per-source progress.
    ///
    /// Plan sources without a registered collector are skipped and produce
    /// no result. The plan is not validated here; an inverted window simply
    /// selects nothing from window-aware collectors.
    #[instrument(skip_all, fields(plan_id = %plan.plan_id, sources = plan.source_ids.len()))]
    pub async fn execute_plan_with_progress(
        &self,
        plan: &CollectionPlan,
        progress: Arc<dyn PlanProgress>,
    ) -> PlanOutcome {
        let started = Instant::now();
        let runnable = self.runnable_sources(plan);
        let thresholds = plan.quality_thresholds.or(self.config.default_thresholds);
        let limit = self.config.concurrency_for(runnable.len());

        info!(
            runnable = runnable.len(),
            limit,
            enrichment = ?plan.enrichment_level,
            "starting plan"
        );

        let resolver = Arc::new(EntityResolver::with_source_order(&plan.source_ids));
        let source_ids: Vec<String> = runnable.iter().map(|(id, _)| id.clone()).collect();

        let job = SourceJob {
            plan: Arc::new(plan.clone()),
            gate: QualityGate::new(thresholds),
            now: Utc::now(),
            default_timeout: self.config.collector_timeout,
            resolver: Arc::clone(&resolver),
            progress: Arc::clone(&progress),
        };

        let results = fan_out(
            runnable,
            limit,
            move |(source_id, collector): (String, Arc<dyn Collector>)| {
                let job = job.clone();
                async move { job.run(&source_id, collector).await }
            },
            |index, reason| {
                let source_id = &source_ids[index];
                warn!(%source_id, %reason, "source task failed to run");
                let error = ConductorError::Scheduling(reason);
                let result = CollectionResult::failed(&plan.plan_id, source_id, 0.0, error.to_string());
                progress.source_finished(&result);
                result
            },
        )
        .await;

        let entities = resolver.resolve();
        let outcome = PlanOutcome {
            plan_id: plan.plan_id.clone(),
            results,
            entities,
        };

        let failed = outcome.results.iter().filter(|r| !r.succeeded).count();
        info!(
            sources = outcome.results.len(),
            failed,
            admitted = outcome.results.iter().map(|r| r.records_admitted).sum::<usize>(),
            entities = outcome.entities.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "plan finished"
        );

        progress.done(&outcome);
        outcome
    }

    /// Registered collectors for the plan's sources, in plan order, each once.
    fn runnable_sources(&self, plan: &CollectionPlan) -> Vec<(String, Arc<dyn Collector>)> {
        let mut seen = HashSet::new();
        let mut runnable = Vec::new();
        for source_id in &plan.source_ids {
            if !seen.insert(source_id.as_str()) {
                warn!(%source_id, "source listed twice in plan, running once");
                continue;
            }
            match self.collectors.get(source_id) {
                Some(collector) => runnable.push((source_id.clone(), collector)),
                None => warn!(%source_id, "no collector registered for source, skipping"),
            }
        }
        runnable
    }
}

/// Per-run state shared by every source task.
#[derive(Clone)]
struct SourceJob {
    plan: Arc<CollectionPlan>,
    gate: QualityGate,
    now: DateTime<Utc>,
    default_timeout: Duration,
    resolver: Arc<EntityResolver>,
    progress: Arc<dyn PlanProgress>,
}

impl SourceJob {
    async fn run(&self, source_id: &str, collector: Arc<dyn Collector>) -> CollectionResult {
        self.progress.source_started(source_id);

        let request = CollectionRequest::for_source(&self.plan, source_id);

        let call_started = Instant::now();
        let call = catch_panic(|| {
            let deadline = collector.timeout().unwrap_or(self.default_timeout);
            (deadline, collector.collect_enriched(&request))
        });
        let outcome = match call {
            Ok((deadline, fut)) => with_deadline(deadline, fut).await,
            Err(e) => Err(e),
        };
        let duration_s = call_started.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(records) => self.admit(source_id, records, duration_s),
            Err(e) => {
                warn!(source_id, kind = %e.failure_kind(), error = %e, "collector failed");
                CollectionResult::failed(&self.plan.plan_id, source_id, duration_s, e.to_string())
            }
        };

        self.progress.source_finished(&result);
        result
    }

    /// Gate `records`, register admitted mentions, and summarize the source.
    fn admit(&self, source_id: &str, records: Vec<Record>, duration_s: f64) -> CollectionResult {
        let records_collected = records.len();
        let (admitted, rejected) = self.gate.filter(records, self.now);

        let mut quality_sum = 0.0;
        let mut with_mentions = 0usize;
        for record in admitted {
            quality_sum += record.quality_score;
            if !record.entity_mentions.is_empty() {
                with_mentions += 1;
            }
            for mut mention in record.entity_mentions {
                mention.source_id = source_id.to_string();
                if mention.record_id.is_empty() {
                    mention.record_id = record.record_id.clone();
                }
                self.resolver.register(mention);
            }
        }

        let records_admitted = records_collected - rejected;
        let (avg_quality, semantic_coverage_pct) = if records_admitted == 0 {
            (0.0, 0.0)
        } else {
            let n = records_admitted as f64;
            (quality_sum / n, with_mentions as f64 / n * 100.0)
        };

        debug!(
            source_id,
            records_collected, records_admitted, rejected, duration_s, "source collected"
        );

        CollectionResult {
            plan_id: self.plan.plan_id.clone(),
            source_id: source_id.to_string(),
            succeeded: true,
            records_collected,
            records_admitted,
            avg_quality,
            semantic_coverage_pct,
            duration_s,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use conductor_shared::{EntityMention, QualityThresholds, Result};

    use super::*;

    /// Returns a fixed record set after an optional delay.
    struct StaticCollector {
        id: String,
        delay: Duration,
        records: Vec<Record>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticCollector {
        fn new(id: &str, records: Vec<Record>) -> Self {
            Self {
                id: id.to_string(),
                delay: Duration::ZERO,
                records,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn delay(mut self, ms: u64) -> Self {
            self.delay = Duration::from_millis(ms);
            self
        }
    }

    #[async_trait]
    impl Collector for StaticCollector {
        fn id(&self) -> &str {
            &self.id
        }

        async fn collect_enriched(&self, _request: &CollectionRequest) -> Result<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.records.clone())
        }
    }

    struct BrokenCollector {
        panics: bool,
    }

    #[async_trait]
    impl Collector for BrokenCollector {
        fn id(&self) -> &str {
            if self.panics { "panicky" } else { "broken" }
        }

        async fn collect_enriched(&self, _request: &CollectionRequest) -> Result<Vec<Record>> {
            if self.panics {
                panic!("feed parser overflow");
            }
            Err(ConductorError::unit_fault("upstream returned 503"))
        }
    }

    /// Sleeps 100ms while tracking how many collectors are in flight.
    struct TrackedCollector {
        id: String,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for TrackedCollector {
        fn id(&self) -> &str {
            &self.id
        }

        async fn collect_enriched(&self, _request: &CollectionRequest) -> Result<Vec<Record>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![record(&format!("{}-1", self.id), 0.9)])
        }
    }

    /// Run five tracked sources under `config` and return the peak in-flight count.
    async fn peak_sources(config: CollectionConfig) -> usize {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids: Vec<String> = (0..5).map(|i| format!("src-{i}")).collect();

        let mut collectors = CollectorRegistry::new();
        for id in &ids {
            collectors.register(Arc::new(TrackedCollector {
                id: id.clone(),
                in_flight: Arc::clone(&in_flight),
                peak: Arc::clone(&peak),
            }));
        }

        let end = Utc::now();
        let plan = CollectionPlan::new(end - ChronoDuration::hours(24), end, ids.iter().cloned());
        let outcome = PlanExecutor::new(collectors, config).execute_plan(&plan).await;
        assert_eq!(outcome.results.len(), 5);
        assert!(outcome.results.iter().all(|r| r.succeeded));

        peak.load(Ordering::SeqCst)
    }

    /// Collects fine, but `timeout()` panics.
    struct PanickingTimeout;

    #[async_trait]
    impl Collector for PanickingTimeout {
        fn id(&self) -> &str {
            "bad_timeout"
        }

        async fn collect_enriched(&self, _request: &CollectionRequest) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }

        fn timeout(&self) -> Option<Duration> {
            panic!("timeout table not loaded");
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        started: Mutex<Vec<String>>,
        finished: AtomicUsize,
        done: AtomicUsize,
    }

    impl PlanProgress for RecordingProgress {
        fn source_started(&self, source_id: &str) {
            self.started
                .lock()
                .expect("lock")
                .push(source_id.to_string());
        }

        fn source_finished(&self, _result: &CollectionResult) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn done(&self, _outcome: &PlanOutcome) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn plan(sources: &[&str]) -> CollectionPlan {
        let end = Utc::now();
        CollectionPlan::new(end - ChronoDuration::hours(24), end, sources.iter().copied())
    }

    fn record(id: &str, quality: f64) -> Record {
        Record::new(id, quality, 1.0, Utc::now() - ChronoDuration::hours(1))
    }

    fn executor(collectors: CollectorRegistry) -> PlanExecutor {
        PlanExecutor::new(collectors, CollectionConfig::default())
    }

    #[tokio::test]
    async fn computes_per_source_stats() {
        let records = vec![
            record("r1", 0.9).with_mention(EntityMention::new("", "", "vessel", "X", 0.8)),
            record("r2", 0.7),
            record("r3", 0.2),
        ];
        let collectors = CollectorRegistry::new().with(StaticCollector::new("ais", records));
        let plan = plan(&["ais"]).with_thresholds(QualityThresholds {
            min_quality: Some(0.5),
            ..QualityThresholds::default()
        });

        let outcome = executor(collectors).execute_plan(&plan).await;
        let result = &outcome.results[0];
        assert!(result.succeeded);
        assert_eq!(result.plan_id, plan.plan_id);
        assert_eq!(result.records_collected, 3);
        assert_eq!(result.records_admitted, 2);
        assert!((result.avg_quality - 0.8).abs() < 1e-9);
        assert_eq!(result.semantic_coverage_pct, 50.0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn unregistered_sources_are_skipped() {
        let collectors = CollectorRegistry::new()
            .with(StaticCollector::new("ais", vec![record("r1", 1.0)]))
            .with(StaticCollector::new("unused", vec![]));
        let outcome = executor(collectors)
            .execute_plan(&plan(&["ghost", "ais", "ais"]))
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].source_id, "ais");
    }

    #[tokio::test]
    async fn collector_faults_are_isolated() {
        let collectors = CollectorRegistry::new()
            .with(BrokenCollector { panics: false })
            .with(BrokenCollector { panics: true })
            .with(StaticCollector::new("ok", vec![record("r1", 1.0)]));
        let outcome = executor(collectors)
            .execute_plan(&plan(&["broken", "panicky", "ok"]))
            .await;

        let ids: Vec<_> = outcome.results.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["broken", "panicky", "ok"]);

        let broken = &outcome.results[0];
        assert!(!broken.succeeded);
        assert_eq!(broken.records_collected, 0);
        assert!(broken.errors[0].contains("upstream returned 503"));

        assert!(outcome.results[1].errors[0].contains("panicked"));
        assert_eq!(outcome.results[2].records_admitted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_collector_times_out() {
        let config = CollectionConfig {
            collector_timeout: Duration::from_millis(500),
            ..CollectionConfig::default()
        };
        let collectors = CollectorRegistry::new()
            .with(StaticCollector::new("slow", vec![record("r1", 1.0)]).delay(5_000))
            .with(StaticCollector::new("fast", vec![record("r1", 1.0)]).delay(10));
        let outcome = PlanExecutor::new(collectors, config)
            .execute_plan(&plan(&["slow", "fast"]))
            .await;

        let slow = &outcome.results[0];
        assert!(!slow.succeeded);
        assert_eq!(slow.records_collected, 0);
        assert!(slow.errors[0].contains("timed out"));
        assert!(outcome.results[1].succeeded);
    }

    #[tokio::test]
    async fn entities_resolve_across_sources() {
        let a = vec![record("a1", 0.9).with_mention(EntityMention::new("", "", "vessel", "X", 0.6))];
        let b = vec![
            record("b1", 0.9).with_mention(EntityMention::new("spoofed", "", "vessel", "X", 0.9)),
            record("b2", 0.9).with_mention(EntityMention::new("", "", "vessel", "lonely", 0.9)),
        ];
        let collectors = CollectorRegistry::new()
            .with(StaticCollector::new("A", a))
            .with(StaticCollector::new("B", b));

        let outcome = executor(collectors).execute_plan(&plan(&["A", "B"])).await;
        assert_eq!(outcome.entities.len(), 1);
        let entity = &outcome.entities[0];
        assert_eq!(entity.canonical_form, "X");
        assert_eq!(entity.confidence, 0.9);
        assert_eq!(entity.contributing_sources, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn rejected_records_contribute_no_mentions() {
        let low = |id: &str| {
            record(id, 0.1).with_mention(EntityMention::new("", "", "vessel", "X", 0.9))
        };
        let collectors = CollectorRegistry::new()
            .with(StaticCollector::new("A", vec![low("a1")]))
            .with(StaticCollector::new("B", vec![low("b1")]));
        let config = CollectionConfig {
            default_thresholds: QualityThresholds {
                min_quality: Some(0.5),
                ..QualityThresholds::default()
            },
            ..CollectionConfig::default()
        };

        let outcome = PlanExecutor::new(collectors, config)
            .execute_plan(&plan(&["A", "B"]))
            .await;
        assert!(outcome.entities.is_empty());
        assert!(outcome.results.iter().all(|r| r.records_admitted == 0));
        assert!(outcome.results.iter().all(|r| r.avg_quality == 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn source_limit_is_honored_and_progress_reported() {
        let progress = Arc::new(RecordingProgress::default());
        let config = CollectionConfig {
            max_concurrent_sources: 1,
            ..CollectionConfig::default()
        };
        let collectors = CollectorRegistry::new()
            .with(StaticCollector::new("first", vec![]).delay(100))
            .with(StaticCollector::new("second", vec![]).delay(10));

        let outcome = PlanExecutor::new(collectors, config)
            .execute_plan_with_progress(&plan(&["first", "second"]), progress.clone())
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(
            *progress.started.lock().expect("lock"),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(progress.finished.load(Ordering::SeqCst), 2);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_plan_yields_empty_outcome() {
        let outcome = executor(CollectorRegistry::new())
            .execute_plan(&plan(&[]))
            .await;
        assert!(outcome.results.is_empty());
        assert!(outcome.entities.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sources_run_concurrently_by_default() {
        assert_eq!(peak_sources(CollectionConfig::default()).await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn source_limit_caps_in_flight_collectors() {
        for limit in [1, 2] {
            let config = CollectionConfig {
                max_concurrent_sources: limit,
                ..CollectionConfig::default()
            };
            assert_eq!(peak_sources(config).await, limit, "limit {limit}");
        }
    }

    #[tokio::test]
    async fn panicking_timeout_hook_fails_only_its_source() {
        let collectors = CollectorRegistry::new()
            .with(PanickingTimeout)
            .with(StaticCollector::new("ok", vec![record("r1", 1.0)]));
        let outcome = executor(collectors)
            .execute_plan(&plan(&["bad_timeout", "ok"]))
            .await;

        let bad = &outcome.results[0];
        assert!(!bad.succeeded);
        assert!(bad.errors[0].contains("panicked"));
        assert!(outcome.results[1].succeeded);
    }
}
