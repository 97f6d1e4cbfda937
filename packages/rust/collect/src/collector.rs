//! Collector contract and registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use conductor_shared::{CollectionPlan, EnrichmentLevel, Record, Result};

/// What a collector is asked to produce for one source of one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub plan_id: String,
    pub source_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub enrichment_level: EnrichmentLevel,
}

impl CollectionRequest {
    pub fn for_source(plan: &CollectionPlan, source_id: &str) -> Self {
        Self {
            plan_id: plan.plan_id.clone(),
            source_id: source_id.to_string(),
            window_start: plan.window_start,
            window_end: plan.window_end,
            enrichment_level: plan.enrichment_level,
        }
    }

    /// Whether `timestamp` lies inside the inclusive request window.
    pub fn in_window(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.window_start && timestamp <= self.window_end
    }
}

/// Produces records from one external data source.
///
/// An `Err` (or a panic) from `collect_enriched` is recorded as a failed
/// source; it never aborts sibling sources.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source id this collector serves. Matched exactly against plan sources.
    fn id(&self) -> &str;

    /// Collect records for the request window, with entity mentions attached
    /// according to the requested enrichment level.
    async fn collect_enriched(&self, request: &CollectionRequest) -> Result<Vec<Record>>;

    /// Per-collector deadline overriding the configured collector timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Source id to collector mapping. Read-only once handed to an executor.
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: HashMap<String, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `collector` under its own id, replacing any previous one.
    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        let id = collector.id().to_string();
        if self.collectors.insert(id.clone(), collector).is_some() {
            warn!(source_id = %id, "replaced previously registered collector");
        }
    }

    pub fn with(mut self, collector: impl Collector + 'static) -> Self {
        self.register(Arc::new(collector));
        self
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.get(source_id).cloned()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.collectors.contains_key(source_id)
    }

    /// Registered source ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.collectors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("sources", &self.ids())
            .finish()
    }
}
