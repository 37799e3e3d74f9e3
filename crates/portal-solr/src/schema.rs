//! Engine schema: field names, field definitions and the spatial field
//! type backing geometry search.

use serde::{Deserialize, Serialize};

use crate::SolrError;

/// Document id field, holding the feature identifier.
pub const ID_FIELD: &str = "id";
/// Index membership field, holding the search index id.
pub const SEARCH_LAYER_FIELD: &str = "searchLayer";
/// Searchable values.
pub const SEARCH_FIELD: &str = "searchFields";
/// Values shown with a hit: stored, never searched.
pub const DISPLAY_FIELD: &str = "displayFields";
/// Feature geometry as WKT.
pub const GEOMETRY_FIELD: &str = "geometry";
/// Name of the spatial field type backing the geometry field.
pub const SPATIAL_FIELD_TYPE: &str = "geometry_rpt";

/// How the spatial field type treats invalid geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryValidationRule {
    /// Reject documents carrying an invalid geometry.
    Error,
    /// Accept invalid geometries unchanged.
    None,
    /// Repair invalid geometries with a zero-distance buffer.
    #[default]
    RepairBuffer0,
    /// Repair invalid geometries with their convex hull.
    RepairConvexHull,
}

impl GeometryValidationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryValidationRule::Error => "error",
            GeometryValidationRule::None => "none",
            GeometryValidationRule::RepairBuffer0 => "repairBuffer0",
            GeometryValidationRule::RepairConvexHull => "repairConvexHull",
        }
    }
}

impl std::fmt::Display for GeometryValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GeometryValidationRule {
    type Err = SolrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(GeometryValidationRule::Error),
            "none" => Ok(GeometryValidationRule::None),
            "repairBuffer0" => Ok(GeometryValidationRule::RepairBuffer0),
            "repairConvexHull" => Ok(GeometryValidationRule::RepairConvexHull),
            other => Err(SolrError::Config(format!(
                "unknown geometry validation rule: '{other}'"
            ))),
        }
    }
}

/// Definition of one schema field, shaped for the engine's schema API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<bool>,
    #[serde(rename = "multiValued", skip_serializing_if = "Option::is_none")]
    pub multi_valued: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uninvertible: Option<bool>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            indexed: None,
            stored: None,
            multi_valued: None,
            required: None,
            uninvertible: None,
        }
    }

    fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = Some(indexed);
        self
    }

    fn stored(mut self, stored: bool) -> Self {
        self.stored = Some(stored);
        self
    }

    fn multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = Some(multi_valued);
        self
    }

    fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    fn uninvertible(mut self, uninvertible: bool) -> Self {
        self.uninvertible = Some(uninvertible);
        self
    }
}

/// The fields every index document carries.
///
/// Display values are stored but deliberately not indexed; only the
/// search values take part in matching.
pub fn field_definitions() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new(SEARCH_LAYER_FIELD, "string")
            .indexed(true)
            .stored(true)
            .multi_valued(false)
            .required(true)
            .uninvertible(false),
        FieldDefinition::new(GEOMETRY_FIELD, SPATIAL_FIELD_TYPE).stored(true),
        FieldDefinition::new(SEARCH_FIELD, "text_general")
            .indexed(true)
            .stored(true)
            .multi_valued(true)
            .required(true)
            .uninvertible(false),
        FieldDefinition::new(DISPLAY_FIELD, "text_general")
            .indexed(false)
            .stored(true)
            .multi_valued(true)
            .required(true)
            .uninvertible(false),
    ]
}

/// Spatial field type definition for the geometry field.
///
/// Planar coordinates in the web mercator value range; geometries are
/// exchanged as WKT.
pub fn spatial_field_type(rule: GeometryValidationRule) -> serde_json::Value {
    serde_json::json!({
        "name": SPATIAL_FIELD_TYPE,
        "class": "solr.SpatialRecursivePrefixTreeFieldType",
        "spatialContextFactory": "JTS",
        "geo": false,
        "distanceUnits": "kilometers",
        "distCalculator": "cartesian",
        "format": "WKT",
        "autoIndex": true,
        "distErrPct": "0.025",
        "maxDistErr": "0.001",
        "prefixTree": "packedQuad",
        "validationRule": rule.as_str(),
        "worldBounds": "ENVELOPE(-20037508.34, 20037508.34, 20048966.1, -20048966.1)"
    })
}
