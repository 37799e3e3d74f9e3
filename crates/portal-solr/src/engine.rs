//! Engine abstraction used by the index build pipeline.

use async_trait::async_trait;

use crate::document::IndexDocument;
use crate::error::SolrError;

/// Operations the build pipeline needs from a search engine.
///
/// The production implementation is [`crate::SolrClient`]; tests swap in
/// recording fakes.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create any missing schema fields and field types.
    async fn ensure_schema(&self) -> Result<(), SolrError>;

    /// Remove all documents belonging to a search index.
    async fn clear_index(&self, index_id: i64) -> Result<(), SolrError>;

    /// Submit a batch of documents. Documents are not visible until
    /// [`SearchEngine::commit`] is called.
    async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SolrError>;

    /// Make all pending changes visible.
    async fn commit(&self) -> Result<(), SolrError>;

    /// Check that the engine is reachable and healthy.
    async fn ping(&self) -> Result<(), SolrError>;
}
