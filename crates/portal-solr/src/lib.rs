//! # portal-solr
//!
//! Solr client for the geoportal search index: schema bootstrap, batched
//! document submission, index clearing and queries, all scoped to one
//! core.
//!
//! The build pipeline consumes the [`SearchEngine`] trait; [`SolrClient`]
//! is its production implementation over the engine's v1 JSON APIs.

pub mod client;
pub mod document;
pub mod engine;
mod error;
pub mod schema;

pub use client::{SearchHit, SearchResult, SolrClient, SolrConfig};
pub use document::IndexDocument;
pub use engine::SearchEngine;
pub use error::SolrError;
