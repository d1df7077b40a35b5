//! GeoJSON-shaped wire types for feature collections.
//!
//! These mirror the subset of GeoJSON the project API exchanges: a
//! `FeatureCollection` of `Feature`s whose geometry is a `Polygon`. Feature
//! identity and versioning ride as top-level members (`id`, `version`, `name`)
//! next to the standard `properties` object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GeoJSON type tag for feature collections.
pub const FEATURE_COLLECTION_TYPE: &str = "FeatureCollection";
/// GeoJSON type tag for features.
pub const FEATURE_TYPE: &str = "Feature";
/// GeoJSON type tag for polygons.
pub const POLYGON_TYPE: &str = "Polygon";

/// A GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"` on output.
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    /// The features.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a collection from features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: FEATURE_COLLECTION_TYPE.to_string(),
            features,
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn feature_collection_type() -> String {
    FEATURE_COLLECTION_TYPE.to_string()
}

fn feature_type() -> String {
    FEATURE_TYPE.to_string()
}

/// A GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always `"Feature"` on output.
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    /// Project-scoped id (required on update edits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Stored or expected version (required on update edits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The geometry. Missing geometry is a format error.
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Free-form properties (`elevation` for plateaus).
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Create a feature with a polygon geometry and no attributes.
    pub fn from_geometry(geometry: Geometry) -> Self {
        Self {
            kind: feature_type(),
            id: None,
            version: None,
            name: None,
            geometry: Some(geometry),
            properties: Some(Map::new()),
        }
    }

    /// Set the id and version.
    pub fn with_identity(mut self, id: i64, version: u32) -> Self {
        self.id = Some(id);
        self.version = Some(version);
        self
    }

    /// Set a property.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Look up a property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }
}

/// A GeoJSON geometry object.
///
/// Coordinates are kept as raw JSON so that non-polygon geometries can be
/// rejected with a precise message instead of a generic decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Geometry type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw coordinate array.
    #[serde(default)]
    pub coordinates: Value,
}

impl Geometry {
    /// Build a polygon geometry from rings of `[x, y]` positions.
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Self {
            kind: POLYGON_TYPE.to_string(),
            coordinates: serde_json::json!(rings),
        }
    }

    /// Whether the type tag is `"Polygon"`.
    pub fn is_polygon(&self) -> bool {
        self.kind == POLYGON_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let json = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "elevation": 3.5 },
                "id": 4,
                "version": 2
            }]
        });

        let collection: FeatureCollection = serde_json::from_value(json).unwrap();
        assert_eq!(collection.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.id, Some(4));
        assert_eq!(feature.version, Some(2));
        assert_eq!(feature.property("elevation").and_then(Value::as_f64), Some(3.5));
        assert!(feature.geometry.as_ref().unwrap().is_polygon());
    }

    #[test]
    fn test_missing_features_is_rejected() {
        let result: Result<FeatureCollection, _> = serde_json::from_value(serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_output_omits_absent_identity() {
        let feature = Feature::from_geometry(Geometry::polygon(vec![vec![[0.0, 0.0]]]));
        let json = serde_json::to_value(&feature).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["type"], "Feature");
    }
}
