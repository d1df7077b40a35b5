//! # plateau-split
//!
//! Partitions building-limit polygons by elevation-tagged height plateaus.
//!
//! Each building limit is cut into disjoint split fragments, one per
//! overlapping plateau, and every fragment inherits the elevation of the
//! plateau covering it.
//!
//! ## Core Contract
//!
//! 1. Plateaus must not overlap each other and must jointly cover every building limit
//! 2. Fragments are recomputed wholesale whenever a limit or plateau changes
//! 3. Edits declare the version they were read against; stale edits are rejected
//!
//! ## Architecture
//!
//! ```text
//! GeoJSON → geometry::parse_collection → split::validate → split::split
//!         → split::match_fragments → SplitFragment[]
//!                    ↑
//!          ProjectService (create / update / delete)
//!                    ↓
//!          ProjectStore (Postgres or Memory)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same limits + same plateaus + same tolerances → identical fragments
//! - Limits are visited in id order, plateaus in id order within each limit
//! - Fragment ids are `1..=n` in that order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod config;
pub mod geometry;
pub mod split;
pub mod project;
pub mod store;
pub mod canonical;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    BuildingLimit, Feature, FeatureCollection, FeatureId, FeatureKind, Footprint, Geometry,
    HeightPlateau, ProjectId, ProjectSnapshot, SplitFragment, INITIAL_VERSION,
};
pub use config::SplitConfig;
pub use geometry::{geometry_to_polygon, parse_collection, polygon_to_geometry, ParsedFeature};
pub use split::{compute_splits, SplitError, SplitPipeline};
pub use project::{
    FeatureEdit, ProjectError, ProjectService, ProjectUpdate, UpdateOutcome, UpdatedVersion,
};
pub use store::{InMemoryProjectStore, ProjectStore, ProjectTransaction};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresProjectStore};
pub use canonical::{canonical_hash, canonical_hash_hex, fragment_set_hash, to_canonical_bytes};

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};
