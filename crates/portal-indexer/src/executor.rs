//! Index build executor.
//!
//! Streams features from a source, flattens them into engine documents
//! and submits them in batches. New documents become visible in a single
//! commit at the end of the run, so searches keep answering from the old
//! documents while a build is in flight.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use portal_scheduler::{ProgressChannel, TaskProgressEvent, TaskType};
use portal_solr::{IndexDocument, SearchEngine};
use portal_types::repository::{FeatureTypeRepository, SearchIndexRepository};
use portal_types::{FeatureType, IndexStatus, IndexSummary, SearchIndex};

use crate::error::{IndexError, SourceError};
use crate::geometry::simplified_wkt;
use crate::source::{AttributeValue, Feature, FeatureQuery, FeatureSource};

/// Documents submitted to the engine per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// How long a single source read may take before the build fails.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 60;

/// Counters accumulated over one build run.
///
/// Kept outside the build itself so a failed run can still report how far
/// it got.
#[derive(Debug, Default)]
struct BuildStats {
    /// Features read from the source.
    seen: u64,
    /// Features dropped because no search or display values were found.
    skipped: u64,
}

/// Builds search indexes.
pub struct IndexExecutor {
    engine: Arc<dyn SearchEngine>,
    source: Arc<dyn FeatureSource>,
    indexes: Arc<dyn SearchIndexRepository>,
    feature_types: Arc<dyn FeatureTypeRepository>,
    progress: ProgressChannel,
    batch_size: usize,
    source_timeout: Duration,
}

impl IndexExecutor {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        source: Arc<dyn FeatureSource>,
        indexes: Arc<dyn SearchIndexRepository>,
        feature_types: Arc<dyn FeatureTypeRepository>,
        progress: ProgressChannel,
    ) -> Self {
        Self {
            engine,
            source,
            indexes,
            feature_types,
            progress,
            batch_size: DEFAULT_BATCH_SIZE,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Build one search index from scratch.
    ///
    /// On success the record moves to [`IndexStatus::Indexed`] and the run
    /// summary is persisted. On failure the record moves to
    /// [`IndexStatus::Error`] with the failure message and the counters
    /// reached so far, and the error is returned. Cancellation is observed
    /// at batch boundaries and counts as a failure; nothing is committed.
    pub async fn build_index(
        &self,
        index_id: i64,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary, IndexError> {
        let index = self
            .indexes
            .find_by_id(index_id)
            .await?
            .ok_or(IndexError::IndexNotFound(index_id))?;
        let feature_type = self
            .feature_types
            .find_by_id(index.feature_type_id)
            .await?
            .ok_or(IndexError::FeatureTypeNotFound(index.feature_type_id))?;

        let started_at = Utc::now();
        let mut stats = BuildStats::default();
        let outcome = self
            .run_build(&index, &feature_type, started_at, &mut stats, cancel)
            .await;

        match outcome {
            Ok(()) => {
                let finished_at = Utc::now();
                let summary =
                    IndexSummary::success(started_at, finished_at, stats.seen, stats.skipped);
                info!(index_id, name = %index.name, "{summary}");

                let mut updated = index;
                updated.status = IndexStatus::Indexed;
                updated.last_indexed = Some(finished_at);
                updated.summary = Some(summary.clone());
                self.indexes.save(updated).await?;
                Ok(summary)
            }
            Err(e) => {
                error!(index_id, name = %index.name, error = %e, "index build failed");
                let summary = IndexSummary::failure(
                    started_at,
                    Utc::now(),
                    stats.seen,
                    stats.skipped,
                    e.to_string(),
                );

                let mut updated = index;
                updated.status = IndexStatus::Error;
                updated.summary = Some(summary);
                if let Err(save_err) = self.indexes.save(updated).await {
                    error!(index_id, error = %save_err, "could not persist failed build state");
                }
                Err(e)
            }
        }
    }

    async fn run_build(
        &self,
        index: &SearchIndex,
        feature_type: &FeatureType,
        started_at: DateTime<Utc>,
        stats: &mut BuildStats,
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        let search_fields = visible_fields(&index.search_fields, feature_type);
        let display_fields = visible_fields(&index.display_fields, feature_type);
        if search_fields.is_empty() {
            warn!(index_id = index.id, name = %index.name, "no search fields configured, not indexing");
            return Err(IndexError::NoSearchFields);
        }

        self.engine.ensure_schema().await?;
        self.engine.clear_index(index.id).await?;

        let mut indexing = index.clone();
        indexing.status = IndexStatus::Indexing;
        self.indexes.save(indexing).await?;
        info!(index_id = index.id, name = %index.name, "indexing started");

        let query = FeatureQuery::with_properties(property_names(
            feature_type,
            &search_fields,
            &display_fields,
        ));
        let mut reader = self.source.open(feature_type, query).await?;
        let total = reader.total();
        let instance_id = Uuid::new_v4();

        let mut batch: Vec<IndexDocument> = Vec::with_capacity(self.batch_size);
        loop {
            let next = tokio::time::timeout(self.source_timeout, reader.try_next())
                .await
                .map_err(|_| SourceError::Timeout(self.source_timeout.as_secs()))??;
            let Some(feature) = next else { break };

            stats.seen += 1;
            match build_document(index, feature_type, &search_fields, &display_fields, &feature) {
                Some(document) => batch.push(document),
                None => {
                    trace!(feature = %feature.id, "no search or display values, skipping");
                    stats.skipped += 1;
                }
            }

            if stats.seen % self.batch_size as u64 == 0 {
                if !batch.is_empty() {
                    self.engine.add_documents(mem::take(&mut batch)).await?;
                }
                info!(
                    index_id = index.id,
                    indexed = stats.seen - stats.skipped,
                    skipped = stats.skipped,
                    "indexing progress"
                );
                self.publish_progress(index, instance_id, started_at, stats, total);
                if cancel.is_cancelled() {
                    warn!(index_id = index.id, "index build cancelled");
                    return Err(IndexError::Cancelled);
                }
            }
        }

        if !batch.is_empty() {
            self.engine.add_documents(batch).await?;
        }
        self.engine.commit().await?;
        Ok(())
    }

    fn publish_progress(
        &self,
        index: &SearchIndex,
        instance_id: Uuid,
        started_at: DateTime<Utc>,
        stats: &BuildStats,
        total: Option<u64>,
    ) {
        let event = TaskProgressEvent::new(TaskType::Index, instance_id, started_at)
            .with_progress(stats.seen - stats.skipped, total)
            .with_task_data(serde_json::json!({ "indexId": index.id }));
        self.progress.publish(event);
    }
}

/// Configured fields minus the ones an administrator has hidden.
fn visible_fields(fields: &[String], feature_type: &FeatureType) -> Vec<String> {
    fields
        .iter()
        .filter(|name| !feature_type.is_hidden(name))
        .cloned()
        .collect()
}

/// Attributes to request from the source, in order and without
/// duplicates: key, geometry, then the configured fields.
fn property_names(
    feature_type: &FeatureType,
    search_fields: &[String],
    display_fields: &[String],
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut add = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };
    if let Some(pk) = &feature_type.primary_key_attribute {
        add(pk);
    }
    if let Some(geometry) = &feature_type.default_geometry_attribute {
        add(geometry);
    }
    for name in search_fields.iter().chain(display_fields) {
        add(name);
    }
    names
}

/// Flatten one feature into a document, or `None` when it has nothing to
/// search or show and must be skipped.
fn build_document(
    index: &SearchIndex,
    feature_type: &FeatureType,
    search_fields: &[String],
    display_fields: &[String],
    feature: &Feature,
) -> Option<IndexDocument> {
    let search_values = field_values(feature, search_fields);
    let display_values = field_values(feature, display_fields);
    if search_values.is_empty() || display_values.is_empty() {
        return None;
    }

    let mut document = IndexDocument::new(feature.id.clone(), index.id);
    document.search_fields = search_values;
    document.display_fields = display_values;
    document.geometry = feature_type
        .default_geometry_attribute
        .as_deref()
        .and_then(|name| feature.attribute(name))
        .and_then(|value| match value {
            AttributeValue::Geometry(g) => Some(simplified_wkt(g)),
            _ => None,
        });
    Some(document)
}

/// Non-empty text renderings of the named attributes, in field order.
fn field_values(feature: &Feature, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|name| feature.attribute(name))
        .map(AttributeValue::as_text)
        .filter(|value| !value.is_empty())
        .collect()
}
