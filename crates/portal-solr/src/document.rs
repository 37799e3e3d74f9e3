//! Documents submitted to the search engine.

use serde::{Deserialize, Serialize};

/// One feature, flattened for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Feature identifier.
    pub id: String,
    /// Search index this document belongs to.
    #[serde(rename = "searchLayer")]
    pub search_layer: i64,
    /// Searchable values, in configured field order.
    #[serde(rename = "searchFields")]
    pub search_fields: Vec<String>,
    /// Values shown with a hit, in configured field order.
    #[serde(rename = "displayFields")]
    pub display_fields: Vec<String>,
    /// Feature geometry as WKT, when the feature has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, search_layer: i64) -> Self {
        Self {
            id: id.into(),
            search_layer,
            search_fields: Vec::new(),
            display_fields: Vec::new(),
            geometry: None,
        }
    }
}
