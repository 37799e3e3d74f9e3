//! Feature source boundary.
//!
//! The executor streams features through these traits; concrete backends
//! (WFS, JDBC and friends) live with the embedding application.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::Geometry;
use wkt::ToWkt;

use portal_types::FeatureType;

use crate::error::SourceError;

/// One attribute value read from a feature source.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Geometry(Geometry<f64>),
}

impl AttributeValue {
    /// Text rendering used for search and display values.
    pub fn as_text(&self) -> String {
        match self {
            AttributeValue::Text(v) => v.clone(),
            AttributeValue::Integer(v) => v.to_string(),
            AttributeValue::Real(v) => v.to_string(),
            AttributeValue::Boolean(v) => v.to_string(),
            AttributeValue::Date(v) => v.to_rfc3339(),
            AttributeValue::Geometry(v) => v.wkt_string(),
        }
    }
}

/// One feature read from a source.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// Source-assigned feature identifier.
    pub id: String,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// Which attributes a reader should fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureQuery {
    /// Attributes to fetch, without duplicates. Empty fetches everything.
    pub property_names: Vec<String>,
}

impl FeatureQuery {
    pub fn with_properties(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            property_names: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Streaming cursor over a source's features.
#[async_trait]
pub trait FeatureReader: Send {
    /// Number of features the cursor will yield, when the source can tell
    /// cheaply up front.
    fn total(&self) -> Option<u64>;

    /// Next feature, or `None` once the source is drained.
    async fn try_next(&mut self) -> Result<Option<Feature>, SourceError>;
}

/// A geodata backend features can be read from.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn open(
        &self,
        feature_type: &FeatureType,
        query: FeatureQuery,
    ) -> Result<Box<dyn FeatureReader + Send>, SourceError>;
}
