//! Feature type metadata the pipeline reads from the catalog.

use serde::{Deserialize, Serialize};

/// A feature type registered with the portal.
///
/// Only the fields the index pipeline needs are carried here; the catalog
/// holds far more per feature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureType {
    pub id: i64,
    pub name: String,
    /// Attribute holding the feature identifier, when the source declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_attribute: Option<String>,
    /// Attribute holding the geometry to index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_geometry_attribute: Option<String>,
    /// Attributes administrators have hidden from search output.
    #[serde(default)]
    pub hidden_attributes: Vec<String>,
}

impl FeatureType {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            primary_key_attribute: None,
            default_geometry_attribute: None,
            hidden_attributes: Vec::new(),
        }
    }

    /// Whether an attribute has been hidden by an administrator.
    pub fn is_hidden(&self, attribute: &str) -> bool {
        self.hidden_attributes.iter().any(|a| a == attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hidden() {
        let mut ft = FeatureType::new(1, "roads");
        ft.hidden_attributes = vec!["owner".to_string()];
        assert!(ft.is_hidden("owner"));
        assert!(!ft.is_hidden("name"));
    }

    #[test]
    fn test_serde_shape() {
        let ft = FeatureType {
            id: 3,
            name: "buildings".to_string(),
            primary_key_attribute: Some("fid".to_string()),
            default_geometry_attribute: Some("geom".to_string()),
            hidden_attributes: vec![],
        };
        let value = serde_json::to_value(&ft).unwrap();
        assert_eq!(value["primaryKeyAttribute"], "fid");
        assert_eq!(value["defaultGeometryAttribute"], "geom");
    }
}
