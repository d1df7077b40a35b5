//! Core types for project splitting.

pub mod ids;
pub mod entity;
pub mod geojson;

pub use ids::{ProjectId, FeatureId, FeatureKind};
pub use entity::{
    BuildingLimit, HeightPlateau, SplitFragment, ProjectSnapshot, Footprint,
    INITIAL_VERSION,
};
pub use geojson::{Feature, FeatureCollection, Geometry};
