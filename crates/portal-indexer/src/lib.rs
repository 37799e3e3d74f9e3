//! # portal-indexer
//!
//! Search index build pipeline for the geoportal: streams features from
//! a geodata source into the search engine, on a schedule or on demand.
//!
//! - An executor that batches documents and commits once per run, so
//!   searches keep answering from the old index while a build runs
//! - Task runners wiring builds and engine pings into the scheduler
//! - Entity event hooks that keep scheduled tasks, engine documents and
//!   application references in step with record changes
//! - Startup recovery for interrupted builds and persisted schedules
//! - Geometry simplification so oversized WKT still fits the engine

pub mod error;
pub mod executor;
pub mod geometry;
pub mod hooks;
pub mod recovery;
pub mod source;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{IndexError, SourceError};
pub use executor::{IndexExecutor, DEFAULT_BATCH_SIZE, DEFAULT_SOURCE_TIMEOUT_SECS};
pub use hooks::{FeatureTypeEventHandler, SearchIndexEventHandler};
pub use recovery::{recover_stale_builds, restore_scheduled_tasks};
pub use source::{AttributeValue, Feature, FeatureQuery, FeatureReader, FeatureSource};
pub use tasks::{EnginePingTask, IndexTask};
