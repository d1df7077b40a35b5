//! Attribution of split pieces to their parent limit and plateau.
//!
//! Pieces tagged by the splitter carry their parents directly. Untagged
//! pieces are attributed by containment: candidates are scanned in input
//! order and the first that contains the piece, either exactly or after
//! growing by the match buffer, wins.

use geo::Polygon;

use crate::geometry::planar;
use crate::types::{BuildingLimit, FeatureId, FeatureKind, Footprint, HeightPlateau};

use super::splitter::SplitPiece;
use super::SplitError;

/// A piece with both parents and the inherited elevation resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedFragment {
    /// Fragment polygon.
    pub geometry: Polygon<f64>,
    /// Parent building limit.
    pub building_limit_id: FeatureId,
    /// Parent plateau.
    pub height_plateau_id: FeatureId,
    /// Elevation of the parent plateau.
    pub elevation: f64,
}

/// Resolve the parents of every piece.
///
/// Fails with [`SplitError::UnmatchedFragment`] when a piece has no
/// containing limit or plateau. Validation should make this unreachable, so
/// it is logged as a defect.
pub fn match_fragments(
    pieces: Vec<SplitPiece>,
    limits: &[BuildingLimit],
    plateaus: &[HeightPlateau],
    buffer: f64,
) -> Result<Vec<MatchedFragment>, SplitError> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| match_piece(index, piece, limits, plateaus, buffer))
        .collect()
}

fn match_piece(
    index: usize,
    piece: SplitPiece,
    limits: &[BuildingLimit],
    plateaus: &[HeightPlateau],
    buffer: f64,
) -> Result<MatchedFragment, SplitError> {
    let tagged = piece.origin.and_then(|origin| {
        let plateau = plateaus.iter().find(|p| p.id == origin.height_plateau_id)?;
        limits
            .iter()
            .any(|l| l.id == origin.building_limit_id)
            .then_some((origin.building_limit_id, plateau))
    });

    let (building_limit_id, plateau) = match tagged {
        Some(found) => found,
        None => {
            let limit = find_container(&piece.geometry, limits, buffer)
                .ok_or_else(|| unmatched(index, FeatureKind::BuildingLimit))?;
            let plateau = find_container(&piece.geometry, plateaus, buffer)
                .ok_or_else(|| unmatched(index, FeatureKind::HeightPlateau))?;
            (limit.id, plateau)
        }
    };

    Ok(MatchedFragment {
        geometry: piece.geometry,
        building_limit_id,
        height_plateau_id: plateau.id,
        elevation: plateau.elevation,
    })
}

/// First candidate, in input order, containing `geometry` exactly or after
/// growing by `buffer`.
pub fn find_container<'a, F: Footprint>(
    geometry: &Polygon<f64>,
    candidates: &'a [F],
    buffer: f64,
) -> Option<&'a F> {
    candidates.iter().find(|candidate| {
        planar::bounds_intersect(candidate.geometry(), geometry)
            && (planar::contains(candidate.geometry(), geometry)
                || (buffer > 0.0
                    && planar::contains_buffered(candidate.geometry(), geometry, buffer)))
    })
}

fn unmatched(fragment: usize, missing: FeatureKind) -> SplitError {
    tracing::error!(
        fragment,
        missing = %missing,
        "Split fragment has no containing parent; validation and overlay disagree"
    );
    SplitError::UnmatchedFragment { fragment, missing }
}
