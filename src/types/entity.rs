//! Project entities: building limits, height plateaus and split fragments.

use geo::Polygon;
use serde::{Deserialize, Serialize};

use super::geojson::{Feature, FeatureCollection};
use super::ids::{FeatureId, ProjectId};
use crate::geometry::polygon_to_geometry;

/// Version assigned to newly created entities and to every split fragment.
pub const INITIAL_VERSION: u32 = 1;

/// Anything with a project-scoped id and a polygon footprint.
///
/// The validator and matcher work over this so they can name offending
/// entities in their errors.
pub trait Footprint {
    /// Project-scoped id.
    fn id(&self) -> FeatureId;
    /// The polygon.
    fn geometry(&self) -> &Polygon<f64>;
}

/// The allowed footprint of a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingLimit {
    /// Project-scoped id.
    pub id: FeatureId,
    /// Starts at 1, incremented by exactly 1 on every accepted edit.
    pub version: u32,
    /// Simple polygon.
    pub geometry: Polygon<f64>,
    /// Display name.
    pub name: Option<String>,
}

impl BuildingLimit {
    /// Create a building limit at the initial version.
    pub fn new(id: FeatureId, geometry: Polygon<f64>) -> Self {
        Self {
            id,
            version: INITIAL_VERSION,
            geometry,
            name: None,
        }
    }

    /// Render as a GeoJSON feature.
    pub fn to_feature(&self) -> Feature {
        let mut feature = Feature::from_geometry(polygon_to_geometry(&self.geometry))
            .with_identity(self.id.get(), self.version);
        feature.name = self.name.clone();
        feature
    }
}

impl Footprint for BuildingLimit {
    fn id(&self) -> FeatureId {
        self.id
    }

    fn geometry(&self) -> &Polygon<f64> {
        &self.geometry
    }
}

/// A contiguous developable height zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightPlateau {
    /// Project-scoped id.
    pub id: FeatureId,
    /// Starts at 1, incremented by exactly 1 on every accepted edit.
    pub version: u32,
    /// Elevation inherited by every fragment this plateau covers.
    pub elevation: f64,
    /// Simple polygon.
    pub geometry: Polygon<f64>,
    /// Display name.
    pub name: Option<String>,
}

impl HeightPlateau {
    /// Create a plateau at the initial version.
    pub fn new(id: FeatureId, elevation: f64, geometry: Polygon<f64>) -> Self {
        Self {
            id,
            version: INITIAL_VERSION,
            elevation,
            geometry,
            name: None,
        }
    }

    /// Render as a GeoJSON feature with `properties.elevation`.
    pub fn to_feature(&self) -> Feature {
        let mut feature = Feature::from_geometry(polygon_to_geometry(&self.geometry))
            .with_identity(self.id.get(), self.version)
            .with_property("elevation", self.elevation);
        feature.name = self.name.clone();
        feature
    }
}

impl Footprint for HeightPlateau {
    fn id(&self) -> FeatureId {
        self.id
    }

    fn geometry(&self) -> &Polygon<f64> {
        &self.geometry
    }
}

/// Intersection of exactly one building limit and one height plateau.
///
/// Fragments are never edited; the whole set is recomputed on every change,
/// so `version` is always [`INITIAL_VERSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitFragment {
    /// Project-scoped id, reassigned on every recompute.
    pub id: FeatureId,
    /// Always 1.
    pub version: u32,
    /// Elevation of the parent plateau.
    pub elevation: f64,
    /// Fragment polygon.
    pub geometry: Polygon<f64>,
    /// Parent building limit (lookup only).
    pub building_limit_id: FeatureId,
    /// Parent plateau (lookup only).
    pub height_plateau_id: FeatureId,
}

impl SplitFragment {
    /// Render as a GeoJSON feature carrying its parent ids in `properties`.
    pub fn to_feature(&self) -> Feature {
        Feature::from_geometry(polygon_to_geometry(&self.geometry))
            .with_identity(self.id.get(), self.version)
            .with_property("elevation", self.elevation)
            .with_property("building_limit_id", self.building_limit_id.get())
            .with_property("height_plateau_id", self.height_plateau_id.get())
    }
}

/// Complete stored state of one project.
///
/// The persistence layer always hands out and accepts whole snapshots; the
/// three collections are replaced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Owning project.
    pub project_id: ProjectId,
    /// Building limits, ordered by id.
    pub building_limits: Vec<BuildingLimit>,
    /// Height plateaus, ordered by id.
    pub height_plateaus: Vec<HeightPlateau>,
    /// Split fragments, in pipeline order.
    pub split_fragments: Vec<SplitFragment>,
}

impl ProjectSnapshot {
    /// Find a building limit by id.
    pub fn building_limit(&self, id: FeatureId) -> Option<&BuildingLimit> {
        self.building_limits.iter().find(|limit| limit.id == id)
    }

    /// Find a height plateau by id.
    pub fn height_plateau(&self, id: FeatureId) -> Option<&HeightPlateau> {
        self.height_plateaus.iter().find(|plateau| plateau.id == id)
    }

    /// Building limits as a feature collection.
    pub fn building_limits_collection(&self) -> FeatureCollection {
        FeatureCollection::new(self.building_limits.iter().map(BuildingLimit::to_feature).collect())
    }

    /// Height plateaus as a feature collection.
    pub fn height_plateaus_collection(&self) -> FeatureCollection {
        FeatureCollection::new(self.height_plateaus.iter().map(HeightPlateau::to_feature).collect())
    }

    /// Split fragments as a feature collection.
    pub fn split_fragments_collection(&self) -> FeatureCollection {
        FeatureCollection::new(self.split_fragments.iter().map(SplitFragment::to_feature).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use serde_json::Value;

    fn unit_square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]
    }

    #[test]
    fn test_new_entities_start_at_version_one() {
        let limit = BuildingLimit::new(FeatureId::new(1), unit_square());
        let plateau = HeightPlateau::new(FeatureId::new(1), 2.0, unit_square());
        assert_eq!(limit.version, INITIAL_VERSION);
        assert_eq!(plateau.version, INITIAL_VERSION);
    }

    #[test]
    fn test_plateau_feature_carries_elevation() {
        let plateau = HeightPlateau {
            name: Some("plat-3".to_string()),
            ..HeightPlateau::new(FeatureId::new(3), 7.5, unit_square())
        };
        let feature = plateau.to_feature();
        assert_eq!(feature.id, Some(3));
        assert_eq!(feature.version, Some(1));
        assert_eq!(feature.name.as_deref(), Some("plat-3"));
        assert_eq!(feature.property("elevation").and_then(Value::as_f64), Some(7.5));
    }

    #[test]
    fn test_fragment_feature_carries_parents() {
        let fragment = SplitFragment {
            id: FeatureId::new(1),
            version: INITIAL_VERSION,
            elevation: 5.0,
            geometry: unit_square(),
            building_limit_id: FeatureId::new(2),
            height_plateau_id: FeatureId::new(3),
        };
        let feature = fragment.to_feature();
        assert_eq!(feature.property("building_limit_id").and_then(Value::as_i64), Some(2));
        assert_eq!(feature.property("height_plateau_id").and_then(Value::as_i64), Some(3));
    }
}
