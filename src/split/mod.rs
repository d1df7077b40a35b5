//! Splitting building limits by height plateaus.
//!
//! ## Pipeline
//!
//! ```text
//! limits + plateaus → validate (overlap, coverage) → split (pairwise overlay)
//!                   → match (parent limit + plateau, elevation) → SplitFragment[]
//! ```
//!
//! The pipeline is pure and synchronous. It either returns the complete
//! replacement fragment set or fails without producing anything.
//!
//! ## Determinism
//!
//! Limits are visited in input order and, for each limit, plateaus in input
//! order. Identical inputs yield identical fragments with identical ids.

pub mod validate;
pub mod splitter;
pub mod matcher;

use crate::config::SplitConfig;
use crate::types::{
    BuildingLimit, FeatureId, FeatureKind, HeightPlateau, SplitFragment, INITIAL_VERSION,
};

pub use matcher::{match_fragments, MatchedFragment};
pub use splitter::{split, PieceOrigin, SplitPiece};
pub use validate::{check_coverage, check_overlap, validate};

/// Error type for the split pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    /// Malformed input structure.
    #[error("Invalid GeoJSON: {0}")]
    Format(String),
    /// Invalid or degenerate polygon.
    #[error("Invalid geometry: {0}")]
    Geometry(String),
    /// Two plateaus share more than a negligible area.
    #[error("Height plateaus {first} and {second} overlap (shared area {area})")]
    Overlap {
        /// First plateau of the offending pair.
        first: FeatureId,
        /// Second plateau of the offending pair.
        second: FeatureId,
        /// Shared area.
        area: f64,
    },
    /// Some part of a building limit lies outside every plateau.
    #[error(
        "Height plateaus do not completely cover the building limits: \
         building limit {building_limit} has {uncovered_area} uncovered"
    )]
    Coverage {
        /// The uncovered building limit.
        building_limit: FeatureId,
        /// Area of the limit outside the plateau union.
        uncovered_area: f64,
    },
    /// A fragment has no parent (internal consistency violation).
    #[error("Failed to match split fragment {fragment} to an original {missing}")]
    UnmatchedFragment {
        /// Position of the fragment in splitter output.
        fragment: usize,
        /// Which parent could not be found.
        missing: FeatureKind,
    },
}

impl SplitError {
    /// Prefix a format or geometry message with the feature position.
    pub fn in_feature(self, index: usize) -> Self {
        match self {
            Self::Format(msg) => Self::Format(format!("feature {}: {}", index, msg)),
            Self::Geometry(msg) => Self::Geometry(format!("feature {}: {}", index, msg)),
            other => other,
        }
    }

    /// Whether this error signals a defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::UnmatchedFragment { .. })
    }
}

/// Runs validate → split → match with one set of tolerances.
#[derive(Debug, Clone, Default)]
pub struct SplitPipeline {
    config: SplitConfig,
}

impl SplitPipeline {
    /// Create a pipeline with the given tolerances.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// Get the tolerances.
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Compute the full fragment set for a project's limits and plateaus.
    ///
    /// Fragment ids are `1..=n` in pipeline order; every fragment is at
    /// version 1.
    pub fn compute(
        &self,
        limits: &[BuildingLimit],
        plateaus: &[HeightPlateau],
    ) -> Result<Vec<SplitFragment>, SplitError> {
        validate(limits, plateaus, &self.config)?;

        let pieces = split(limits, plateaus, self.config.min_fragment_area);
        tracing::debug!(
            building_limits = limits.len(),
            height_plateaus = plateaus.len(),
            pieces = pieces.len(),
            "Split building limits"
        );

        let matched = match_fragments(pieces, limits, plateaus, self.config.match_buffer)?;

        Ok(matched
            .into_iter()
            .enumerate()
            .map(|(index, fragment)| SplitFragment {
                id: FeatureId::from_position(index),
                version: INITIAL_VERSION,
                elevation: fragment.elevation,
                geometry: fragment.geometry,
                building_limit_id: fragment.building_limit_id,
                height_plateau_id: fragment.height_plateau_id,
            })
            .collect())
    }
}

/// Compute fragments with the given tolerances.
pub fn compute_splits(
    limits: &[BuildingLimit],
    plateaus: &[HeightPlateau],
    config: &SplitConfig,
) -> Result<Vec<SplitFragment>, SplitError> {
    SplitPipeline::new(*config).compute(limits, plateaus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::planar;
    use geo::{polygon, Polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    #[test]
    fn test_single_plateau_single_fragment() {
        let limits = vec![BuildingLimit::new(FeatureId::new(1), rect(0.0, 0.0, 10.0, 10.0))];
        let plateaus = vec![HeightPlateau::new(FeatureId::new(1), 5.0, rect(0.0, 0.0, 10.0, 10.0))];

        let fragments = compute_splits(&limits, &plateaus, &SplitConfig::default()).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].id, FeatureId::new(1));
        assert_eq!(fragments[0].version, 1);
        assert_eq!(fragments[0].elevation, 5.0);
        assert!((planar::area(&fragments[0].geometry) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_fragment_ids_follow_pipeline_order() {
        let limits = vec![BuildingLimit::new(FeatureId::new(1), rect(0.0, 0.0, 10.0, 10.0))];
        let plateaus = vec![
            HeightPlateau::new(FeatureId::new(1), 1.0, rect(0.0, 0.0, 5.0, 10.0)),
            HeightPlateau::new(FeatureId::new(2), 2.0, rect(5.0, 0.0, 10.0, 10.0)),
        ];

        let fragments = compute_splits(&limits, &plateaus, &SplitConfig::default()).unwrap();
        let ids: Vec<_> = fragments.iter().map(|f| f.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(fragments[0].height_plateau_id, FeatureId::new(1));
        assert_eq!(fragments[1].height_plateau_id, FeatureId::new(2));
    }

    #[test]
    fn test_error_messages_name_offenders() {
        let err = SplitError::Overlap {
            first: FeatureId::new(1),
            second: FeatureId::new(2),
            area: 25.0,
        };
        assert!(err.to_string().contains("1 and 2"));
        assert!(!err.is_internal());

        let err = SplitError::UnmatchedFragment { fragment: 3, missing: FeatureKind::HeightPlateau };
        assert!(err.to_string().contains("height plateau"));
        assert!(err.is_internal());
    }

    #[test]
    fn test_in_feature_prefixes_position() {
        let err = SplitError::Format("no geometry".to_string()).in_feature(2);
        assert_eq!(err, SplitError::Format("feature 2: no geometry".to_string()));
    }
}
