//! # portal-types
//!
//! Shared domain types for the geoportal search index pipeline.
//!
//! This crate defines the records and boundaries the rest of the system
//! is built on:
//! - Search indexes: per-feature-type index configuration, status and
//!   last-run summary
//! - Feature types: the source-side metadata an index is built over
//! - Repositories: async persistence traits the pipeline calls through
//! - Settings: layered configuration loading

pub mod config;
pub mod error;
pub mod feature_type;
pub mod repository;
pub mod search_index;

pub use config::Settings;
pub use error::PortalError;
pub use feature_type::FeatureType;
pub use search_index::{IndexStatus, IndexSummary, SearchIndex, TaskSchedule};
