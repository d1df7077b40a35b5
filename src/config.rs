//! Numeric tolerances for the split pipeline.
//!
//! ## Configuration
//!
//! Every tolerance can be overridden via environment variables:
//! - `SPLIT_OVERLAP_TOLERANCE`: max shared area between two plateaus (default: 1e-9)
//! - `SPLIT_COVERAGE_BUFFER`: outward buffer of the plateau union (default: 1e-6)
//! - `SPLIT_MATCH_BUFFER`: outward buffer of a candidate parent (default: 1e-9)
//! - `SPLIT_MIN_FRAGMENT_AREA`: smallest area kept as a fragment (default: 1e-9)
//!
//! The four values are independent; none is derived from another.

use serde::{Deserialize, Serialize};

/// Default max plateau intersection area.
pub const DEFAULT_OVERLAP_TOLERANCE: f64 = 1e-9;
/// Default coverage buffer distance.
pub const DEFAULT_COVERAGE_BUFFER: f64 = 1e-6;
/// Default matcher buffer distance.
pub const DEFAULT_MATCH_BUFFER: f64 = 1e-9;
/// Default minimum fragment area.
pub const DEFAULT_MIN_FRAGMENT_AREA: f64 = 1e-9;

/// Tolerances used by the validator, splitter and matcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Two plateaus sharing more than this area overlap.
    pub overlap_area_tolerance: f64,
    /// Distance the plateau union is grown by before the coverage test.
    pub coverage_buffer: f64,
    /// Distance a candidate parent is grown by when exact containment fails.
    pub match_buffer: f64,
    /// Intersections smaller than this are rounding artifacts and dropped.
    pub min_fragment_area: f64,
}

impl SplitConfig {
    /// Load tolerances from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            overlap_area_tolerance: env_f64("SPLIT_OVERLAP_TOLERANCE")
                .unwrap_or(DEFAULT_OVERLAP_TOLERANCE),
            coverage_buffer: env_f64("SPLIT_COVERAGE_BUFFER")
                .unwrap_or(DEFAULT_COVERAGE_BUFFER),
            match_buffer: env_f64("SPLIT_MATCH_BUFFER")
                .unwrap_or(DEFAULT_MATCH_BUFFER),
            min_fragment_area: env_f64("SPLIT_MIN_FRAGMENT_AREA")
                .unwrap_or(DEFAULT_MIN_FRAGMENT_AREA),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            overlap_area_tolerance: DEFAULT_OVERLAP_TOLERANCE,
            coverage_buffer: DEFAULT_COVERAGE_BUFFER,
            match_buffer: DEFAULT_MATCH_BUFFER,
            min_fragment_area: DEFAULT_MIN_FRAGMENT_AREA,
        }
    }
}

/// Read a non-negative finite float from the environment.
fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}
