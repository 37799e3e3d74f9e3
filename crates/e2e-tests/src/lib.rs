//! End-to-end test infrastructure for the geoportal index pipeline.
//!
//! Provides a shared [`TestHarness`] wiring the scheduler, task manager,
//! executor and event hooks over in-memory repositories, a static feature
//! source and a recording engine, plus helpers for building test records.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use portal_indexer::{
    AttributeValue, Feature, FeatureQuery, FeatureReader, FeatureSource, IndexExecutor, IndexTask,
    SearchIndexEventHandler, SourceError,
};
use portal_scheduler::{
    JobStore, ProgressChannel, SchedulerConfig, SchedulerService, TaskManager,
};
use portal_solr::{IndexDocument, SearchEngine, SolrError};
use portal_types::repository::{
    ApplicationRepository, FeatureTypeRepository, SearchIndexRepository,
};
use portal_types::{FeatureType, IndexStatus, PortalError, SearchIndex, TaskSchedule};

/// Shared test harness for end-to-end pipeline tests.
///
/// Everything is wired the way the embedding application would wire it,
/// with the persistence and engine edges replaced by in-memory doubles.
pub struct TestHarness {
    pub manager: Arc<TaskManager>,
    pub store: Arc<JobStore>,
    pub engine: Arc<RecordingEngine>,
    pub source: Arc<StaticSource>,
    pub indexes: Arc<InMemoryIndexes>,
    pub feature_types: Arc<InMemoryFeatureTypes>,
    pub applications: Arc<InMemoryApplications>,
    pub executor: Arc<IndexExecutor>,
    pub runner: Arc<IndexTask>,
    pub handler: Arc<SearchIndexEventHandler>,
    pub progress: ProgressChannel,
}

impl TestHarness {
    /// Create a fully wired harness.
    pub async fn new() -> Self {
        let scheduler = Arc::new(
            SchedulerService::new(SchedulerConfig::default())
                .await
                .expect("Failed to create scheduler"),
        );
        let store = Arc::new(JobStore::new());
        let manager = Arc::new(TaskManager::new(scheduler, store.clone()));

        let engine = Arc::new(RecordingEngine::default());
        let source = Arc::new(StaticSource::default());
        let indexes = Arc::new(InMemoryIndexes::default());
        let feature_types = Arc::new(InMemoryFeatureTypes::default());
        let applications = Arc::new(InMemoryApplications::default());
        let progress = ProgressChannel::default();

        let executor = Arc::new(IndexExecutor::new(
            engine.clone(),
            source.clone(),
            indexes.clone(),
            feature_types.clone(),
            progress.clone(),
        ));
        let runner = Arc::new(IndexTask::new(executor.clone()));
        let handler = Arc::new(SearchIndexEventHandler::new(
            manager.clone(),
            runner.clone(),
            applications.clone(),
        ));

        Self {
            manager,
            store,
            engine,
            source,
            indexes,
            feature_types,
            applications,
            executor,
            runner,
            handler,
            progress,
        }
    }

    /// Register the standard roads feature type and an index record over
    /// it, and run the before-save hook so the record gets its task.
    ///
    /// Returns the persisted record, schedule identity assigned.
    pub async fn scheduled_roads_index(&self) -> SearchIndex {
        self.feature_types.insert(roads_feature_type());
        let mut index = roads_index(1);
        self.handler
            .before_save(&mut index)
            .await
            .expect("Failed to schedule index build");
        self.indexes.insert(index.clone());
        index
    }
}

/// The standard test feature type: roads with a primary key attribute.
pub fn roads_feature_type() -> FeatureType {
    let mut feature_type = FeatureType::new(10, "roads");
    feature_type.primary_key_attribute = Some("fid".to_string());
    feature_type
}

/// An index over the roads feature type, scheduled nightly.
pub fn roads_index(id: i64) -> SearchIndex {
    SearchIndex::new(id, "Roads", 10)
        .with_search_fields(["name"])
        .with_display_fields(["name", "description"])
        .with_schedule(TaskSchedule::new("0 0 4 * * *", "nightly roads rebuild"))
}

/// `count` features, each with non-empty name and description values.
pub fn road_features(count: usize) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            Feature::new(format!("roads.{i}"))
                .with_attribute("name", AttributeValue::Text(format!("Street {i}")))
                .with_attribute(
                    "description",
                    AttributeValue::Text(format!("Street {i}, Springfield")),
                )
        })
        .collect()
}

/// Engine double that records documents, clears and commits.
#[derive(Default)]
pub struct RecordingEngine {
    documents: Mutex<Vec<IndexDocument>>,
    batches: Mutex<Vec<usize>>,
    cleared: Mutex<Vec<i64>>,
    commits: AtomicU64,
}

impl RecordingEngine {
    /// Documents currently held for one index.
    pub fn documents_for(&self, index_id: i64) -> Vec<IndexDocument> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.search_layer == index_id)
            .cloned()
            .collect()
    }

    /// Batch sizes submitted, in order.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<i64> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchEngine for RecordingEngine {
    async fn ensure_schema(&self) -> Result<(), SolrError> {
        Ok(())
    }

    async fn clear_index(&self, index_id: i64) -> Result<(), SolrError> {
        self.cleared.lock().unwrap().push(index_id);
        self.documents
            .lock()
            .unwrap()
            .retain(|d| d.search_layer != index_id);
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SolrError> {
        self.batches.lock().unwrap().push(documents.len());
        self.documents.lock().unwrap().extend(documents);
        Ok(())
    }

    async fn commit(&self) -> Result<(), SolrError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), SolrError> {
        Ok(())
    }
}

/// Feature source serving whatever features were last configured.
#[derive(Default)]
pub struct StaticSource {
    features: Mutex<Vec<Feature>>,
}

impl StaticSource {
    pub fn set_features(&self, features: Vec<Feature>) {
        *self.features.lock().unwrap() = features;
    }
}

#[async_trait]
impl FeatureSource for StaticSource {
    async fn open(
        &self,
        _feature_type: &FeatureType,
        _query: FeatureQuery,
    ) -> Result<Box<dyn FeatureReader + Send>, SourceError> {
        let features = self.features.lock().unwrap().clone();
        Ok(Box::new(StaticReader {
            total: features.len() as u64,
            features: features.into(),
        }))
    }
}

struct StaticReader {
    features: VecDeque<Feature>,
    total: u64,
}

#[async_trait]
impl FeatureReader for StaticReader {
    fn total(&self) -> Option<u64> {
        Some(self.total)
    }

    async fn try_next(&mut self) -> Result<Option<Feature>, SourceError> {
        Ok(self.features.pop_front())
    }
}

/// In-memory search index repository.
#[derive(Default)]
pub struct InMemoryIndexes {
    records: Mutex<HashMap<i64, SearchIndex>>,
}

impl InMemoryIndexes {
    pub fn insert(&self, index: SearchIndex) {
        self.records.lock().unwrap().insert(index.id, index);
    }

    pub fn get(&self, id: i64) -> Option<SearchIndex> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn remove(&self, id: i64) -> Option<SearchIndex> {
        self.records.lock().unwrap().remove(&id)
    }
}

#[async_trait]
impl SearchIndexRepository for InMemoryIndexes {
    async fn find_by_id(&self, id: i64) -> Result<Option<SearchIndex>, PortalError> {
        Ok(self.get(id))
    }

    async fn find_by_feature_type_id(
        &self,
        feature_type_id: i64,
    ) -> Result<Vec<SearchIndex>, PortalError> {
        let mut found: Vec<SearchIndex> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|index| index.feature_type_id == feature_type_id)
            .cloned()
            .collect();
        found.sort_by_key(|index| index.id);
        Ok(found)
    }

    async fn find_by_status(&self, status: IndexStatus) -> Result<Vec<SearchIndex>, PortalError> {
        let mut found: Vec<SearchIndex> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|index| index.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|index| index.id);
        Ok(found)
    }

    async fn find_all(&self) -> Result<Vec<SearchIndex>, PortalError> {
        let mut all: Vec<SearchIndex> = self.records.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|index| index.id);
        Ok(all)
    }

    async fn save(&self, index: SearchIndex) -> Result<SearchIndex, PortalError> {
        self.insert(index.clone());
        Ok(index)
    }

    async fn delete(&self, id: i64) -> Result<(), PortalError> {
        self.remove(id);
        Ok(())
    }
}

/// In-memory feature type catalog.
#[derive(Default)]
pub struct InMemoryFeatureTypes {
    records: Mutex<HashMap<i64, FeatureType>>,
}

impl InMemoryFeatureTypes {
    pub fn insert(&self, feature_type: FeatureType) {
        self.records
            .lock()
            .unwrap()
            .insert(feature_type.id, feature_type);
    }
}

#[async_trait]
impl FeatureTypeRepository for InMemoryFeatureTypes {
    async fn find_by_id(&self, id: i64) -> Result<Option<FeatureType>, PortalError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

/// Application repository remembering which index references were scrubbed.
#[derive(Default)]
pub struct InMemoryApplications {
    cleared: Mutex<Vec<i64>>,
}

impl InMemoryApplications {
    pub fn cleared(&self) -> Vec<i64> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplications {
    async fn clear_search_index_references(&self, index_id: i64) -> Result<u64, PortalError> {
        self.cleared.lock().unwrap().push(index_id);
        Ok(1)
    }
}
