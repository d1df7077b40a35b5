//! Identifier types for projects and their features.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a project.
///
/// A project exclusively owns its building limits, height plateaus and
/// split fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(i64);

impl ProjectId {
    /// Create a project id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProjectId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Project-scoped identifier of a building limit, height plateau or fragment.
///
/// Ids are only unique within one project and one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(i64);

impl FeatureId {
    /// Create a feature id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Id for the entity at zero-based `position`; ids start at 1.
    pub fn from_position(position: usize) -> Self {
        Self(position as i64 + 1)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FeatureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Which editable collection a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// A building limit.
    BuildingLimit,
    /// A height plateau.
    HeightPlateau,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildingLimit => write!(f, "building limit"),
            Self::HeightPlateau => write!(f, "height plateau"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_start_at_one() {
        let ids: Vec<_> = (0..3).map(FeatureId::from_position).collect();
        assert_eq!(ids, vec![FeatureId::new(1), FeatureId::new(2), FeatureId::new(3)]);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&FeatureId::new(7)).unwrap();
        assert_eq!(json, "7");
        let id: ProjectId = serde_json::from_str("42").unwrap();
        assert_eq!(id.get(), 42);
    }
}
