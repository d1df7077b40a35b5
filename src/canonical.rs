//! Canonical serialization for deterministic hashing.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - Stable float format: f64 serializes consistently
//!
//! Used to fingerprint fragment sets so repeated recomputation over the same
//! stored limits and plateaus can be compared by value.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::types::SplitFragment;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Serialization of the crate's own types cannot fail; an error yields an
/// empty buffer.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Fingerprint of a complete fragment set, order included.
pub fn fragment_set_hash(fragments: &[SplitFragment]) -> String {
    canonical_hash_hex(&fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureId, INITIAL_VERSION};
    use geo::polygon;

    fn fragment(elevation: f64) -> SplitFragment {
        SplitFragment {
            id: FeatureId::new(1),
            version: INITIAL_VERSION,
            elevation,
            geometry: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
            building_limit_id: FeatureId::new(1),
            height_plateau_id: FeatureId::new(1),
        }
    }

    #[test]
    fn test_determinism() {
        let fragments = vec![fragment(5.0)];
        assert_eq!(fragment_set_hash(&fragments), fragment_set_hash(&fragments.clone()));
        assert_eq!(fragment_set_hash(&fragments).len(), 16);
    }

    #[test]
    fn test_elevation_changes_hash() {
        assert_ne!(fragment_set_hash(&[fragment(5.0)]), fragment_set_hash(&[fragment(6.0)]));
    }
}
