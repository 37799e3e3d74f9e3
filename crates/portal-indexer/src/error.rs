//! Error types for the index build pipeline.

use thiserror::Error;

use portal_scheduler::SchedulerError;
use portal_solr::SolrError;
use portal_types::PortalError;

/// Errors from reading a feature source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading from the source failed
    #[error("Source I/O error: {0}")]
    Io(String),

    /// The source cannot serve the requested feature type
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// A single read took longer than the configured timeout
    #[error("Source timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors from building or scheduling a search index.
///
/// The display string of the variant that failed a build becomes the
/// error message in the persisted run summary.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Search index {0} not found")]
    IndexNotFound(i64),

    #[error("Feature type {0} not found")]
    FeatureTypeNotFound(i64),

    /// The index record names no searchable attributes
    #[error("No search fields configured")]
    NoSearchFields,

    /// The build observed a cancelled token at a batch boundary
    #[error("build cancelled")]
    Cancelled,

    /// A schedule was added to a record that already has a scheduled task
    #[error("A scheduled task already exists for search index: '{0}'")]
    TaskExists(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Engine(#[from] SolrError),

    #[error(transparent)]
    Repository(#[from] PortalError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
