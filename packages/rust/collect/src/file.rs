//! Collector backed by a JSON file of records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use conductor_shared::{ConductorError, EnrichmentLevel, Record, Result};

use crate::collector::{CollectionRequest, Collector};

/// Reads a JSON array of [`Record`]s on every collection.
///
/// Only records timestamped inside the request window are returned. At
/// [`EnrichmentLevel::Basic`] entity mentions are stripped.
#[derive(Debug, Clone)]
pub struct JsonFileCollector {
    id: String,
    path: PathBuf,
}

impl JsonFileCollector {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn collect_enriched(&self, request: &CollectionRequest) -> Result<Vec<Record>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConductorError::io(&self.path, e))?;

        let records: Vec<Record> = serde_json::from_str(&content).map_err(|e| {
            ConductorError::parse(format!("invalid records in {}: {e}", self.path.display()))
        })?;

        let total = records.len();
        let mut in_window: Vec<Record> = records
            .into_iter()
            .filter(|r| request.in_window(r.timestamp))
            .collect();

        if request.enrichment_level == EnrichmentLevel::Basic {
            for record in &mut in_window {
                record.entity_mentions.clear();
            }
        }

        debug!(
            source_id = %self.id,
            path = %self.path.display(),
            total,
            in_window = in_window.len(),
            "loaded records"
        );
        Ok(in_window)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use conductor_shared::{CollectionPlan, EntityMention, FailureKind};

    use super::*;

    async fn fixture(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("conductor-test-{}", uuid::Uuid::now_v7()));
        tokio::fs::create_dir_all(&dir).await.expect("create dir");
        let path = dir.join(name);
        tokio::fs::write(&path, content).await.expect("write fixture");
        path
    }

    fn request(level: EnrichmentLevel) -> CollectionRequest {
        let end = Utc::now();
        let mut plan = CollectionPlan::new(end - Duration::hours(24), end, ["file"]);
        plan.enrichment_level = level;
        CollectionRequest::for_source(&plan, "file")
    }

    fn records_json() -> String {
        let now = Utc::now();
        let records = vec![
            Record::new("fresh", 0.9, 1.0, now - Duration::hours(1))
                .with_mention(EntityMention::new("", "", "vessel", "X", 0.7)),
            Record::new("stale", 0.9, 1.0, now - Duration::hours(48)),
            Record::new("future", 0.9, 1.0, now + Duration::hours(1)),
        ];
        serde_json::to_string(&records).expect("serialize")
    }

    #[tokio::test]
    async fn keeps_only_records_in_window() {
        let path = fixture("ais.json", &records_json()).await;
        let collector = JsonFileCollector::new("file", &path);

        let records = collector
            .collect_enriched(&request(EnrichmentLevel::Standard))
            .await
            .expect("collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_id, "fresh");
        assert_eq!(records[0].entity_mentions.len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[tokio::test]
    async fn basic_enrichment_strips_mentions() {
        let path = fixture("ais.json", &records_json()).await;
        let collector = JsonFileCollector::new("file", &path);

        let records = collector
            .collect_enriched(&request(EnrichmentLevel::Basic))
            .await
            .expect("collect");
        assert!(records[0].entity_mentions.is_empty());

        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let collector = JsonFileCollector::new("file", "/nonexistent/conductor/records.json");
        let err = collector
            .collect_enriched(&request(EnrichmentLevel::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::Io { .. }));
        assert_eq!(err.failure_kind(), FailureKind::UnitFault);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let path = fixture("bad.json", "{\"not\": \"an array\"}").await;
        let collector = JsonFileCollector::new("file", &path);
        let err = collector
            .collect_enriched(&request(EnrichmentLevel::Standard))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid records"));

        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }
}
