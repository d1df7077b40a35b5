//! Coverage and overlap validation.
//!
//! Runs to completion before any split is attempted. Overlapping plateaus
//! would make a fragment's elevation ambiguous; uncovered limit area would
//! leave a fragment with no elevation at all.

use crate::config::SplitConfig;
use crate::geometry::planar;
use crate::types::Footprint;

use super::SplitError;

/// Check non-overlap, then coverage.
pub fn validate<L: Footprint, P: Footprint>(
    limits: &[L],
    plateaus: &[P],
    config: &SplitConfig,
) -> Result<(), SplitError> {
    check_overlap(plateaus, config.overlap_area_tolerance)?;
    check_coverage(limits, plateaus, config.coverage_buffer)
}

/// Fail if any unordered pair of plateaus shares more than `tolerance` area.
///
/// Plateaus that only touch along an edge or at a vertex share zero area and
/// pass.
pub fn check_overlap<P: Footprint>(plateaus: &[P], tolerance: f64) -> Result<(), SplitError> {
    for (i, first) in plateaus.iter().enumerate() {
        for second in &plateaus[i + 1..] {
            if !planar::bounds_intersect(first.geometry(), second.geometry()) {
                continue;
            }
            let area = planar::intersection_area(first.geometry(), second.geometry());
            if area > tolerance {
                tracing::warn!(
                    first = %first.id(),
                    second = %second.id(),
                    area,
                    "Height plateaus overlap"
                );
                return Err(SplitError::Overlap {
                    first: first.id(),
                    second: second.id(),
                    area,
                });
            }
        }
    }
    Ok(())
}

/// Fail unless the plateau union, grown by `buffer`, contains every limit.
pub fn check_coverage<L: Footprint, P: Footprint>(
    limits: &[L],
    plateaus: &[P],
    buffer: f64,
) -> Result<(), SplitError> {
    let union = planar::union_all(plateaus.iter().map(|plateau| plateau.geometry()));
    let grown = if buffer > 0.0 {
        planar::buffered(&union, buffer)
    } else {
        union.clone()
    };

    for limit in limits {
        if !planar::multi_contains(&grown, limit.geometry()) {
            let uncovered_area = planar::uncovered_area(limit.geometry(), &union);
            tracing::warn!(
                building_limit = %limit.id(),
                uncovered_area,
                "Building limit not covered by height plateaus"
            );
            return Err(SplitError::Coverage {
                building_limit: limit.id(),
                uncovered_area,
            });
        }
    }
    Ok(())
}
