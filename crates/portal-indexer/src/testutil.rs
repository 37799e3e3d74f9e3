//! Shared fakes for pipeline tests: a recording engine, an in-memory
//! feature source and in-memory repositories.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use portal_solr::{IndexDocument, SearchEngine, SolrError};
use portal_types::repository::{
    ApplicationRepository, FeatureTypeRepository, SearchIndexRepository,
};
use portal_types::{FeatureType, IndexStatus, PortalError, SearchIndex};

use crate::error::SourceError;
use crate::source::{AttributeValue, Feature, FeatureQuery, FeatureReader, FeatureSource};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    EnsureSchema,
    ClearIndex(i64),
    AddDocuments(usize),
    Commit,
    Ping,
}

/// Engine fake recording every call, with failure injection.
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    pub documents: Mutex<Vec<IndexDocument>>,
    fail_add: AtomicBool,
    fail_ping: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make subsequent document submissions fail.
    pub fn fail_add(&self) {
        self.fail_add.store(true, Ordering::SeqCst);
    }

    /// Make subsequent pings fail.
    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected() -> SolrError {
        SolrError::Engine {
            status: 500,
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl SearchEngine for MockEngine {
    async fn ensure_schema(&self) -> Result<(), SolrError> {
        self.record(EngineCall::EnsureSchema);
        Ok(())
    }

    async fn clear_index(&self, index_id: i64) -> Result<(), SolrError> {
        self.record(EngineCall::ClearIndex(index_id));
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SolrError> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.record(EngineCall::AddDocuments(documents.len()));
        self.documents.lock().unwrap().extend(documents);
        Ok(())
    }

    async fn commit(&self) -> Result<(), SolrError> {
        self.record(EngineCall::Commit);
        Ok(())
    }

    async fn ping(&self) -> Result<(), SolrError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.record(EngineCall::Ping);
        Ok(())
    }
}

/// Feature source serving a fixed list of features, recording queries.
pub struct MockSource {
    features: Vec<Feature>,
    pub queries: Mutex<Vec<FeatureQuery>>,
}

impl MockSource {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FeatureSource for MockSource {
    async fn open(
        &self,
        _feature_type: &FeatureType,
        query: FeatureQuery,
    ) -> Result<Box<dyn FeatureReader + Send>, SourceError> {
        self.queries.lock().unwrap().push(query);
        Ok(Box::new(VecReader {
            total: self.features.len() as u64,
            features: self.features.clone().into(),
        }))
    }
}

struct VecReader {
    features: VecDeque<Feature>,
    total: u64,
}

#[async_trait]
impl FeatureReader for VecReader {
    fn total(&self) -> Option<u64> {
        Some(self.total)
    }

    async fn try_next(&mut self) -> Result<Option<Feature>, SourceError> {
        Ok(self.features.pop_front())
    }
}

/// `count` features, each carrying a non-empty `name` attribute.
pub fn feature_batch(count: usize) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            Feature::new(format!("roads.{i}"))
                .with_attribute("name", AttributeValue::Text(format!("Street {i}")))
        })
        .collect()
}

/// In-memory search index repository, logging every status written.
#[derive(Default)]
pub struct InMemoryIndexes {
    records: Mutex<HashMap<i64, SearchIndex>>,
    status_log: Mutex<Vec<(i64, IndexStatus)>>,
}

impl InMemoryIndexes {
    pub fn with(indexes: impl IntoIterator<Item = SearchIndex>) -> Arc<Self> {
        let repo = Self::default();
        {
            let mut records = repo.records.lock().unwrap();
            for index in indexes {
                records.insert(index.id, index);
            }
        }
        Arc::new(repo)
    }

    pub fn get(&self, id: i64) -> Option<SearchIndex> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Statuses saved for one record, in write order.
    pub fn statuses(&self, id: i64) -> Vec<IndexStatus> {
        self.status_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(record_id, _)| *record_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl SearchIndexRepository for InMemoryIndexes {
    async fn find_by_id(&self, id: i64) -> Result<Option<SearchIndex>, PortalError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
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
        self.status_log
            .lock()
            .unwrap()
            .push((index.id, index.status));
        self.records.lock().unwrap().insert(index.id, index.clone());
        Ok(index)
    }

    async fn delete(&self, id: i64) -> Result<(), PortalError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// In-memory feature type catalog.
#[derive(Default)]
pub struct InMemoryFeatureTypes {
    records: Mutex<HashMap<i64, FeatureType>>,
}

impl InMemoryFeatureTypes {
    pub fn with(types: impl IntoIterator<Item = FeatureType>) -> Arc<Self> {
        let repo = Self::default();
        {
            let mut records = repo.records.lock().unwrap();
            for feature_type in types {
                records.insert(feature_type.id, feature_type);
            }
        }
        Arc::new(repo)
    }
}

#[async_trait]
impl FeatureTypeRepository for InMemoryFeatureTypes {
    async fn find_by_id(&self, id: i64) -> Result<Option<FeatureType>, PortalError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

/// Application repository counting reference scrubs.
#[derive(Default)]
pub struct CountingApplications {
    cleared: AtomicU64,
}

impl CountingApplications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cleared(&self) -> u64 {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApplicationRepository for CountingApplications {
    async fn clear_search_index_references(&self, _index_id: i64) -> Result<u64, PortalError> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }
}
