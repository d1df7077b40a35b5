//! Pairwise overlay of building limits against plateaus.

use geo::Polygon;

use crate::geometry::planar;
use crate::types::{FeatureId, Footprint};

/// The limit/plateau pair an overlay piece was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceOrigin {
    /// Source building limit.
    pub building_limit_id: FeatureId,
    /// Source height plateau.
    pub height_plateau_id: FeatureId,
}

/// One polygon produced by the overlay, optionally tagged with its sources.
///
/// Untagged pieces are attributed afterwards by containment search.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPiece {
    /// Fragment polygon.
    pub geometry: Polygon<f64>,
    /// Sources, when known.
    pub origin: Option<PieceOrigin>,
}

impl SplitPiece {
    /// A piece with no source tag.
    pub fn untagged(geometry: Polygon<f64>) -> Self {
        Self { geometry, origin: None }
    }
}

/// Intersect every limit with every plateau.
///
/// A pair whose overlay yields several disjoint polygons contributes one
/// piece per polygon. Pieces with area at or below `min_area` are rounding
/// artifacts and are dropped. Output order is limit-major, plateau-minor, in
/// input order.
pub fn split<L: Footprint, P: Footprint>(limits: &[L], plateaus: &[P], min_area: f64) -> Vec<SplitPiece> {
    let mut pieces = Vec::new();
    let mut discarded = 0usize;

    for limit in limits {
        for plateau in plateaus {
            let overlay = planar::intersection(limit.geometry(), plateau.geometry());
            for polygon in overlay {
                if planar::area(&polygon) <= min_area {
                    discarded += 1;
                    continue;
                }
                pieces.push(SplitPiece {
                    geometry: polygon,
                    origin: Some(PieceOrigin {
                        building_limit_id: limit.id(),
                        height_plateau_id: plateau.id(),
                    }),
                });
            }
        }
    }

    if discarded > 0 {
        tracing::debug!(discarded, min_area, "Dropped negligible overlay pieces");
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildingLimit, HeightPlateau};
    use geo::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    #[test]
    fn test_diagonal_split_yields_two_triangles() {
        let limits = vec![BuildingLimit::new(FeatureId::new(1), rect(10.0, 10.0, 20.0, 20.0))];
        let plateaus = vec![
            HeightPlateau::new(
                FeatureId::new(1),
                5.0,
                polygon![(x: 10.0, y: 10.0), (x: 20.0, y: 10.0), (x: 20.0, y: 20.0)],
            ),
            HeightPlateau::new(
                FeatureId::new(2),
                6.0,
                polygon![(x: 10.0, y: 10.0), (x: 20.0, y: 20.0), (x: 10.0, y: 20.0)],
            ),
        ];

        let pieces = split(&limits, &plateaus, 1e-9);
        assert_eq!(pieces.len(), 2);
        for piece in &pieces {
            assert!((planar::area(&piece.geometry) - 50.0).abs() < 1e-9);
        }
        assert_eq!(pieces[0].origin.unwrap().height_plateau_id, FeatureId::new(1));
        assert_eq!(pieces[1].origin.unwrap().height_plateau_id, FeatureId::new(2));
    }

    #[test]
    fn test_touching_pair_yields_nothing() {
        let limits = vec![BuildingLimit::new(FeatureId::new(1), rect(0.0, 0.0, 1.0, 1.0))];
        let plateaus = vec![HeightPlateau::new(FeatureId::new(1), 1.0, rect(1.0, 0.0, 2.0, 1.0))];
        assert!(split(&limits, &plateaus, 1e-9).is_empty());
    }

    #[test]
    fn test_sliver_below_threshold_is_dropped() {
        let limits = vec![BuildingLimit::new(FeatureId::new(1), rect(0.0, 0.0, 10.0, 10.0))];
        let plateaus = vec![HeightPlateau::new(FeatureId::new(1), 1.0, rect(9.99, 0.0, 20.0, 10.0))];
        assert_eq!(split(&limits, &plateaus, 1e-9).len(), 1);
        assert!(split(&limits, &plateaus, 1.0).is_empty());
    }

    #[test]
    fn test_concave_limit_yields_disjoint_pieces() {
        // U-shaped limit crossed by a horizontal band: two separate legs.
        let limits = vec![BuildingLimit::new(
            FeatureId::new(1),
            polygon![
                (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 7.0, y: 10.0),
                (x: 7.0, y: 3.0), (x: 3.0, y: 3.0), (x: 3.0, y: 10.0), (x: 0.0, y: 10.0)
            ],
        )];
        let plateaus = vec![HeightPlateau::new(FeatureId::new(1), 1.0, rect(0.0, 5.0, 10.0, 8.0))];

        let pieces = split(&limits, &plateaus, 1e-9);
        assert_eq!(pieces.len(), 2);
        let total: f64 = pieces.iter().map(|p| planar::area(&p.geometry)).sum();
        assert!((total - 18.0).abs() < 1e-9);
    }
}
