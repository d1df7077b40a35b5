//! Geometry adapter: GeoJSON feature collections to `geo` polygons and back.
//!
//! Parsing is pure. A collection is rejected as a whole on the first
//! offending feature:
//! - missing feature list, missing geometry or a non-`Polygon` type is a
//!   [`SplitError::Format`]
//! - a polygon failing the validity predicate (self-intersection, zero
//!   area, degenerate ring) is a [`SplitError::Geometry`]

pub mod planar;

use geo::{Coord, LineString, Polygon};
use serde_json::Value;

use crate::split::SplitError;
use crate::types::{Feature, FeatureId, Geometry};

/// Minimum number of positions in a closed GeoJSON linear ring.
const MIN_RING_POSITIONS: usize = 4;

/// A feature after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeature {
    /// The validated polygon.
    pub polygon: Polygon<f64>,
    /// Top-level `id`, if any.
    pub id: Option<FeatureId>,
    /// Top-level `version`, if any.
    pub version: Option<u32>,
    /// Top-level `name`, or `properties.name`.
    pub name: Option<String>,
    /// `properties.elevation`, if any.
    pub elevation: Option<f64>,
}

/// Parse a raw JSON feature collection.
pub fn parse_collection(input: &Value) -> Result<Vec<ParsedFeature>, SplitError> {
    let features = input
        .get("features")
        .ok_or_else(|| SplitError::Format("input has no feature list".to_string()))?;
    let features: Vec<Feature> = serde_json::from_value(features.clone())
        .map_err(|e| SplitError::Format(format!("malformed feature list: {}", e)))?;
    parse_features(&features)
}

/// Parse already-decoded features.
pub fn parse_features(features: &[Feature]) -> Result<Vec<ParsedFeature>, SplitError> {
    if features.is_empty() {
        return Err(SplitError::Format("feature list is empty".to_string()));
    }
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| parse_feature(index, feature))
        .collect()
}

fn parse_feature(index: usize, feature: &Feature) -> Result<ParsedFeature, SplitError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| SplitError::Format(format!("feature {} has no geometry", index)))?;
    let polygon = geometry_to_polygon(geometry)
        .map_err(|e| e.in_feature(index))?;

    let elevation = match feature.property("elevation") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_f64().filter(|v| v.is_finite()).ok_or_else(|| {
            SplitError::Format(format!("feature {} has a non-numeric elevation", index))
        })?),
    };

    let name = feature.name.clone().or_else(|| {
        feature
            .property("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Ok(ParsedFeature {
        polygon,
        id: feature.id.map(FeatureId::new),
        version: feature.version,
        name,
        elevation,
    })
}

/// Convert a GeoJSON geometry into a validated polygon.
pub fn geometry_to_polygon(geometry: &Geometry) -> Result<Polygon<f64>, SplitError> {
    if !geometry.is_polygon() {
        return Err(SplitError::Format(format!(
            "geometry type must be Polygon, got {}",
            geometry.kind
        )));
    }

    let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(geometry.coordinates.clone())
        .map_err(|e| SplitError::Format(format!("malformed polygon coordinates: {}", e)))?;

    let mut rings = rings
        .into_iter()
        .map(ring_to_line_string)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let exterior = rings
        .next()
        .ok_or_else(|| SplitError::Geometry("polygon has no exterior ring".to_string()))?;
    let polygon = Polygon::new(exterior, rings.collect());

    if !planar::is_valid(&polygon) {
        return Err(SplitError::Geometry(
            "polygon is self-intersecting, zero-area or otherwise degenerate".to_string(),
        ));
    }
    Ok(polygon)
}

fn ring_to_line_string(ring: Vec<Vec<f64>>) -> Result<LineString<f64>, SplitError> {
    if ring.len() < MIN_RING_POSITIONS {
        return Err(SplitError::Geometry(format!(
            "ring has {} positions, at least {} required",
            ring.len(),
            MIN_RING_POSITIONS
        )));
    }
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(SplitError::Format(format!(
                "position {:?} is not a pair of finite numbers",
                position
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Render a polygon as a GeoJSON geometry.
pub fn polygon_to_geometry(polygon: &Polygon<f64>) -> Geometry {
    let rings = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
        .collect();
    Geometry::polygon(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square_feature(elevation: Option<f64>) -> Value {
        let mut feature = json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[10.0, 10.0], [20.0, 10.0], [20.0, 20.0], [10.0, 20.0], [10.0, 10.0]]]
            },
            "properties": {}
        });
        if let Some(elevation) = elevation {
            feature["properties"]["elevation"] = json!(elevation);
        }
        feature
    }

    #[test]
    fn test_parse_valid_collection() {
        let input = json!({ "type": "FeatureCollection", "features": [square_feature(Some(5.0))] });
        let parsed = parse_collection(&input).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].elevation, Some(5.0));
        assert!((planar::area(&parsed[0].polygon) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_feature_list() {
        let err = parse_collection(&json!({})).unwrap_err();
        assert!(matches!(err, SplitError::Format(_)));
    }

    #[test]
    fn test_missing_geometry() {
        let input = json!({ "features": [{ "type": "Feature", "properties": {} }] });
        let err = parse_collection(&input).unwrap_err();
        assert!(matches!(err, SplitError::Format(ref msg) if msg.contains("no geometry")));
    }

    #[test]
    fn test_non_polygon_geometry() {
        let input = json!({ "features": [{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
        }] });
        let err = parse_collection(&input).unwrap_err();
        assert!(matches!(err, SplitError::Format(ref msg) if msg.contains("Point")));
    }

    #[test]
    fn test_self_intersecting_polygon() {
        let input = json!({ "features": [{
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [2.0, 2.0], [2.0, 0.0], [0.0, 2.0], [0.0, 0.0]]]
            }
        }] });
        let err = parse_collection(&input).unwrap_err();
        assert!(matches!(err, SplitError::Geometry(_)));
    }

    #[test]
    fn test_short_ring() {
        let input = json!({ "features": [{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]] }
        }] });
        assert!(matches!(parse_collection(&input), Err(SplitError::Geometry(_))));
    }

    #[test]
    fn test_non_numeric_elevation() {
        let mut feature = square_feature(None);
        feature["properties"]["elevation"] = json!("high");
        let input = json!({ "features": [feature] });
        assert!(matches!(parse_collection(&input), Err(SplitError::Format(_))));
    }

    #[test]
    fn test_polygon_geometry_round_trip() {
        let input = json!({ "features": [square_feature(None)] });
        let parsed = parse_collection(&input).unwrap();
        let geometry = polygon_to_geometry(&parsed[0].polygon);
        assert_eq!(geometry_to_polygon(&geometry).unwrap(), parsed[0].polygon);
    }
}
