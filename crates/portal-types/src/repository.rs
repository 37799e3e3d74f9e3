//! Async persistence boundaries for domain records.
//!
//! The pipeline never talks to a database directly; it calls through these
//! traits so the embedding application can provide its own storage.

use async_trait::async_trait;

use crate::error::PortalError;
use crate::feature_type::FeatureType;
use crate::search_index::{IndexStatus, SearchIndex};

/// Persistence for search index records.
#[async_trait]
pub trait SearchIndexRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<SearchIndex>, PortalError>;

    /// All indexes built over the given feature type.
    async fn find_by_feature_type_id(
        &self,
        feature_type_id: i64,
    ) -> Result<Vec<SearchIndex>, PortalError>;

    /// All indexes currently in the given status.
    async fn find_by_status(&self, status: IndexStatus) -> Result<Vec<SearchIndex>, PortalError>;

    async fn find_all(&self) -> Result<Vec<SearchIndex>, PortalError>;

    /// Persist the record, returning the stored state.
    async fn save(&self, index: SearchIndex) -> Result<SearchIndex, PortalError>;

    async fn delete(&self, id: i64) -> Result<(), PortalError>;
}

/// Read access to feature type metadata.
#[async_trait]
pub trait FeatureTypeRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<FeatureType>, PortalError>;
}

/// Application configuration that may reference search indexes.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Remove references to a deleted search index from application
    /// component configuration. Returns the number of applications changed.
    async fn clear_search_index_references(&self, index_id: i64) -> Result<u64, PortalError>;
}
