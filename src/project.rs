//! Versioned project operations.
//!
//! A project is either absent or present with an up-to-date fragment set.
//! Every operation runs inside one store transaction that holds the project
//! exclusively, so the version check and the commit of bumped versions plus
//! recomputed fragments are atomic with respect to concurrent callers. Any
//! error drops the transaction and leaves stored state untouched.
//!
//! ## Update edits
//!
//! Each edited feature names the stored entity by top-level `id` and declares
//! the `version` it was read against. A single stale version rejects the whole
//! call. Accepted edits bump the entity's version by exactly 1, and the full
//! fragment set is recomputed over edited and untouched features alike.

use std::collections::HashSet;
use std::sync::Arc;

use geo::Polygon;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::canonical::fragment_set_hash;
use crate::config::SplitConfig;
use crate::geometry::{parse_collection, ParsedFeature};
use crate::split::{SplitError, SplitPipeline};
use crate::store::{ProjectStore, ProjectTransaction};
use crate::types::{
    BuildingLimit, FeatureCollection, FeatureId, FeatureKind, HeightPlateau, ProjectId,
    ProjectSnapshot,
};

/// Error type for project operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectError {
    /// Input or pipeline failure.
    #[error(transparent)]
    Split(#[from] SplitError),
    /// Create on a project that already exists.
    #[error("Project {0} already exists")]
    Conflict(ProjectId),
    /// Operation on a project that does not exist.
    #[error("Project {0} not found")]
    NotFound(ProjectId),
    /// An edit declared a version other than the stored one.
    #[error("Version conflict on {kind} {id}: expected version {expected}, stored version {stored}")]
    VersionConflict {
        /// Collection of the stale entity.
        kind: FeatureKind,
        /// The stale entity.
        id: FeatureId,
        /// Version declared by the caller.
        expected: u32,
        /// Version currently stored.
        stored: u32,
    },
    /// An edit named an id the project does not have.
    #[error("No {kind} with id {id} in this project")]
    FeatureNotFound {
        /// Collection searched.
        kind: FeatureKind,
        /// The unknown id.
        id: FeatureId,
    },
    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl ProjectError {
    /// Whether this error signals a defect or infrastructure failure rather
    /// than bad input.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Split(err) => err.is_internal(),
            Self::Store(_) => true,
            _ => false,
        }
    }
}

/// Requested changes for an existing project.
///
/// Each present member is a GeoJSON feature collection of edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    /// Edits to building limits.
    #[serde(default)]
    pub building_limits: Option<Value>,
    /// Edits to height plateaus.
    #[serde(default)]
    pub height_plateaus: Option<Value>,
}

impl ProjectUpdate {
    /// Whether neither collection is present.
    pub fn is_empty(&self) -> bool {
        self.building_limits.is_none() && self.height_plateaus.is_none()
    }
}

/// One parsed edit.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEdit {
    /// Entity being edited.
    pub id: FeatureId,
    /// Version the caller read.
    pub expected_version: u32,
    /// Replacement geometry.
    pub geometry: Polygon<f64>,
    /// Replacement name, if given.
    pub name: Option<String>,
    /// Replacement elevation (plateaus only).
    pub elevation: Option<f64>,
}

/// New version of an edited entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdatedVersion {
    /// Collection.
    pub kind: FeatureKind,
    /// Entity id.
    pub id: FeatureId,
    /// Version after the edit.
    pub version: u32,
}

/// Result of an accepted update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Project state after the update.
    pub snapshot: ProjectSnapshot,
    /// Entities whose version was bumped, limits first.
    pub updated: Vec<UpdatedVersion>,
}

/// Create/update/delete/read over a [`ProjectStore`].
pub struct ProjectService<S: ProjectStore> {
    store: Arc<S>,
    pipeline: SplitPipeline,
}

impl<S: ProjectStore> Clone for ProjectService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<S: ProjectStore> ProjectService<S> {
    /// Create a service with the given tolerances.
    pub fn new(store: Arc<S>, config: SplitConfig) -> Self {
        Self {
            store,
            pipeline: SplitPipeline::new(config),
        }
    }

    /// Get the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the pipeline.
    pub fn pipeline(&self) -> &SplitPipeline {
        &self.pipeline
    }

    /// Create a project from raw building-limit and plateau collections.
    ///
    /// Ids `1..=n` are assigned in input order; caller ids are ignored.
    pub async fn create(
        &self,
        project_id: ProjectId,
        building_limits: &Value,
        height_plateaus: &Value,
    ) -> Result<ProjectSnapshot, ProjectError> {
        let mut tx = self.store.begin(project_id).await.map_err(store_error)?;
        if tx.load().await.map_err(store_error)?.is_some() {
            warn!(project_id = %project_id, "Create rejected: project exists");
            return Err(ProjectError::Conflict(project_id));
        }

        let building_limits = new_building_limits(parse_collection(building_limits)?);
        let height_plateaus = new_height_plateaus(parse_collection(height_plateaus)?)?;

        let split_fragments = self
            .pipeline
            .compute(&building_limits, &height_plateaus)
            .map_err(|e| rejected(project_id, e))?;

        let snapshot = ProjectSnapshot {
            project_id,
            building_limits,
            height_plateaus,
            split_fragments,
        };
        tx.commit(snapshot.clone()).await.map_err(store_error)?;

        info!(
            project_id = %project_id,
            building_limits = snapshot.building_limits.len(),
            height_plateaus = snapshot.height_plateaus.len(),
            split_fragments = snapshot.split_fragments.len(),
            fragment_hash = %fragment_set_hash(&snapshot.split_fragments),
            "Created project"
        );
        Ok(snapshot)
    }

    /// Apply versioned edits and recompute the fragment set.
    pub async fn update(
        &self,
        project_id: ProjectId,
        update: &ProjectUpdate,
    ) -> Result<UpdateOutcome, ProjectError> {
        let mut tx = self.store.begin(project_id).await.map_err(store_error)?;
        let mut snapshot = tx
            .load()
            .await
            .map_err(store_error)?
            .ok_or(ProjectError::NotFound(project_id))?;

        if update.is_empty() {
            return Ok(UpdateOutcome { snapshot, updated: Vec::new() });
        }

        let limit_edits = match &update.building_limits {
            Some(collection) => parse_edits(FeatureKind::BuildingLimit, collection)?,
            None => Vec::new(),
        };
        let plateau_edits = match &update.height_plateaus {
            Some(collection) => parse_edits(FeatureKind::HeightPlateau, collection)?,
            None => Vec::new(),
        };

        // Every edit is checked before any is applied.
        for edit in &limit_edits {
            let stored = snapshot
                .building_limit(edit.id)
                .ok_or(ProjectError::FeatureNotFound { kind: FeatureKind::BuildingLimit, id: edit.id })?;
            check_version(project_id, FeatureKind::BuildingLimit, edit, stored.version)?;
        }
        for edit in &plateau_edits {
            let stored = snapshot
                .height_plateau(edit.id)
                .ok_or(ProjectError::FeatureNotFound { kind: FeatureKind::HeightPlateau, id: edit.id })?;
            check_version(project_id, FeatureKind::HeightPlateau, edit, stored.version)?;
        }

        let mut updated = Vec::with_capacity(limit_edits.len() + plateau_edits.len());
        for edit in limit_edits {
            if let Some(limit) = snapshot.building_limits.iter_mut().find(|l| l.id == edit.id) {
                limit.geometry = edit.geometry;
                if edit.name.is_some() {
                    limit.name = edit.name;
                }
                limit.version += 1;
                updated.push(UpdatedVersion {
                    kind: FeatureKind::BuildingLimit,
                    id: limit.id,
                    version: limit.version,
                });
            }
        }
        for edit in plateau_edits {
            if let Some(plateau) = snapshot.height_plateaus.iter_mut().find(|p| p.id == edit.id) {
                plateau.geometry = edit.geometry;
                if let Some(elevation) = edit.elevation {
                    plateau.elevation = elevation;
                }
                if edit.name.is_some() {
                    plateau.name = edit.name;
                }
                plateau.version += 1;
                updated.push(UpdatedVersion {
                    kind: FeatureKind::HeightPlateau,
                    id: plateau.id,
                    version: plateau.version,
                });
            }
        }

        snapshot.split_fragments = self
            .pipeline
            .compute(&snapshot.building_limits, &snapshot.height_plateaus)
            .map_err(|e| rejected(project_id, e))?;

        tx.commit(snapshot.clone()).await.map_err(store_error)?;

        let touched: Vec<(FeatureKind, i64, u32)> =
            updated.iter().map(|u| (u.kind, u.id.get(), u.version)).collect();
        info!(
            project_id = %project_id,
            updated = ?touched,
            split_fragments = snapshot.split_fragments.len(),
            fragment_hash = %fragment_set_hash(&snapshot.split_fragments),
            "Updated project"
        );
        Ok(UpdateOutcome { snapshot, updated })
    }

    /// Remove a project and everything it owns.
    pub async fn delete(&self, project_id: ProjectId) -> Result<(), ProjectError> {
        let mut tx = self.store.begin(project_id).await.map_err(store_error)?;
        if tx.load().await.map_err(store_error)?.is_none() {
            return Err(ProjectError::NotFound(project_id));
        }
        tx.delete().await.map_err(store_error)?;
        info!(project_id = %project_id, "Deleted project");
        Ok(())
    }

    /// Read the whole project.
    pub async fn get(&self, project_id: ProjectId) -> Result<ProjectSnapshot, ProjectError> {
        let mut tx = self.store.begin(project_id).await.map_err(store_error)?;
        tx.load()
            .await
            .map_err(store_error)?
            .ok_or(ProjectError::NotFound(project_id))
    }

    /// Building limits as a feature collection.
    pub async fn building_limits(&self, project_id: ProjectId) -> Result<FeatureCollection, ProjectError> {
        Ok(self.get(project_id).await?.building_limits_collection())
    }

    /// Height plateaus as a feature collection.
    pub async fn height_plateaus(&self, project_id: ProjectId) -> Result<FeatureCollection, ProjectError> {
        Ok(self.get(project_id).await?.height_plateaus_collection())
    }

    /// Split fragments as a feature collection.
    pub async fn split_fragments(&self, project_id: ProjectId) -> Result<FeatureCollection, ProjectError> {
        Ok(self.get(project_id).await?.split_fragments_collection())
    }
}

fn new_building_limits(parsed: Vec<ParsedFeature>) -> Vec<BuildingLimit> {
    parsed
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let id = FeatureId::from_position(index);
            BuildingLimit {
                name: Some(feature.name.unwrap_or_else(|| format!("limit-{}", id))),
                ..BuildingLimit::new(id, feature.polygon)
            }
        })
        .collect()
}

fn new_height_plateaus(parsed: Vec<ParsedFeature>) -> Result<Vec<HeightPlateau>, SplitError> {
    parsed
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let id = FeatureId::from_position(index);
            let elevation = feature
                .elevation
                .ok_or_else(|| missing_elevation(index))?;
            Ok(HeightPlateau {
                name: Some(feature.name.unwrap_or_else(|| format!("plat-{}", id))),
                ..HeightPlateau::new(id, elevation, feature.polygon)
            })
        })
        .collect()
}

/// Parse an edit collection; every edit needs an id and a version, plateau
/// edits also an elevation.
pub fn parse_edits(kind: FeatureKind, collection: &Value) -> Result<Vec<FeatureEdit>, SplitError> {
    let mut seen = HashSet::new();
    parse_collection(collection)?
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let id = feature.id.ok_or_else(|| {
                SplitError::Format(format!("{} edit {} has no id", kind, index))
            })?;
            let expected_version = feature.version.ok_or_else(|| {
                SplitError::Format(format!("{} edit {} has no version", kind, index))
            })?;
            if !seen.insert(id) {
                return Err(SplitError::Format(format!("{} {} is edited more than once", kind, id)));
            }
            if kind == FeatureKind::HeightPlateau && feature.elevation.is_none() {
                return Err(missing_elevation(index));
            }
            Ok(FeatureEdit {
                id,
                expected_version,
                geometry: feature.polygon,
                name: feature.name,
                elevation: feature.elevation,
            })
        })
        .collect()
}

fn missing_elevation(index: usize) -> SplitError {
    SplitError::Format(format!("height plateau feature {} has no elevation", index))
}

fn check_version(
    project_id: ProjectId,
    kind: FeatureKind,
    edit: &FeatureEdit,
    stored: u32,
) -> Result<(), ProjectError> {
    if edit.expected_version == stored {
        return Ok(());
    }
    warn!(
        project_id = %project_id,
        kind = %kind,
        id = %edit.id,
        expected = edit.expected_version,
        stored,
        "Update rejected: stale version"
    );
    Err(ProjectError::VersionConflict {
        kind,
        id: edit.id,
        expected: edit.expected_version,
        stored,
    })
}

fn rejected(project_id: ProjectId, err: SplitError) -> ProjectError {
    if !err.is_internal() {
        warn!(project_id = %project_id, error = %err, "Split rejected");
    }
    err.into()
}

fn store_error<E: std::error::Error>(err: E) -> ProjectError {
    tracing::error!(error = %err, "Project store failure");
    ProjectError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProjectStore;
    use serde_json::json;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
        })
    }

    fn limits() -> Value {
        json!({ "type": "FeatureCollection", "features": [
            { "type": "Feature", "geometry": square(0.0, 0.0, 10.0, 10.0), "properties": {} }
        ] })
    }

    fn plateaus() -> Value {
        json!({ "type": "FeatureCollection", "features": [
            { "type": "Feature", "geometry": square(0.0, 0.0, 5.0, 10.0), "properties": { "elevation": 1.0 } },
            { "type": "Feature", "geometry": square(5.0, 0.0, 10.0, 10.0), "properties": { "elevation": 2.0 } }
        ] })
    }

    fn service() -> ProjectService<InMemoryProjectStore> {
        ProjectService::new(Arc::new(InMemoryProjectStore::new()), SplitConfig::default())
    }

    fn plateau_edit(id: i64, version: u32, elevation: f64) -> ProjectUpdate {
        ProjectUpdate {
            building_limits: None,
            height_plateaus: Some(json!({ "features": [{
                "type": "Feature",
                "id": id,
                "version": version,
                "geometry": square(0.0, 0.0, 5.0, 10.0),
                "properties": { "elevation": elevation }
            }] })),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_default_names() {
        let service = service();
        let snapshot = service.create(ProjectId::new(1), &limits(), &plateaus()).await.unwrap();

        assert_eq!(snapshot.building_limits[0].id, FeatureId::new(1));
        assert_eq!(snapshot.building_limits[0].name.as_deref(), Some("limit-1"));
        assert_eq!(snapshot.height_plateaus[1].id, FeatureId::new(2));
        assert_eq!(snapshot.height_plateaus[1].name.as_deref(), Some("plat-2"));
        assert_eq!(snapshot.split_fragments.len(), 2);
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();

        let err = service.create(project, &limits(), &plateaus()).await.unwrap_err();
        assert_eq!(err, ProjectError::Conflict(project));
    }

    #[tokio::test]
    async fn test_plateau_without_elevation_is_format_error() {
        let service = service();
        let plateaus = json!({ "features": [
            { "type": "Feature", "geometry": square(0.0, 0.0, 10.0, 10.0), "properties": {} }
        ] });
        let err = service.create(ProjectId::new(1), &limits(), &plateaus).await.unwrap_err();
        assert!(matches!(err, ProjectError::Split(SplitError::Format(_))));
        assert!(matches!(service.get(ProjectId::new(1)).await, Err(ProjectError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_recomputes() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();

        let outcome = service.update(project, &plateau_edit(1, 1, 9.0)).await.unwrap();
        assert_eq!(
            outcome.updated,
            vec![UpdatedVersion { kind: FeatureKind::HeightPlateau, id: FeatureId::new(1), version: 2 }]
        );
        assert_eq!(outcome.snapshot.split_fragments[0].elevation, 9.0);
        // Untouched entities keep their version.
        assert_eq!(outcome.snapshot.height_plateaus[1].version, 1);
        assert_eq!(outcome.snapshot.building_limits[0].version, 1);
    }

    #[tokio::test]
    async fn test_stale_update_changes_nothing() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();
        service.update(project, &plateau_edit(1, 1, 9.0)).await.unwrap();
        let before = service.get(project).await.unwrap();

        let err = service.update(project, &plateau_edit(1, 1, 3.0)).await.unwrap_err();
        assert_eq!(
            err,
            ProjectError::VersionConflict {
                kind: FeatureKind::HeightPlateau,
                id: FeatureId::new(1),
                expected: 1,
                stored: 2,
            }
        );
        assert_eq!(service.get(project).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();

        let err = service.update(project, &plateau_edit(7, 1, 3.0)).await.unwrap_err();
        assert_eq!(
            err,
            ProjectError::FeatureNotFound { kind: FeatureKind::HeightPlateau, id: FeatureId::new(7) }
        );
    }

    #[tokio::test]
    async fn test_update_breaking_coverage_is_rolled_back() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();
        let before = service.get(project).await.unwrap();

        let update = ProjectUpdate {
            building_limits: None,
            height_plateaus: Some(json!({ "features": [{
                "type": "Feature", "id": 1, "version": 1,
                "geometry": square(0.0, 0.0, 4.0, 10.0),
                "properties": { "elevation": 1.0 }
            }] })),
        };
        let err = service.update(project, &update).await.unwrap_err();
        assert!(matches!(err, ProjectError::Split(SplitError::Coverage { .. })));
        assert_eq!(service.get(project).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_update_on_absent_project() {
        let service = service();
        let err = service.update(ProjectId::new(4), &ProjectUpdate::default()).await.unwrap_err();
        assert_eq!(err, ProjectError::NotFound(ProjectId::new(4)));
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let service = service();
        let project = ProjectId::new(1);
        service.create(project, &limits(), &plateaus()).await.unwrap();

        service.delete(project).await.unwrap();
        assert_eq!(service.delete(project).await.unwrap_err(), ProjectError::NotFound(project));
    }

    #[test]
    fn test_edit_requires_id_and_version() {
        let missing_version = json!({ "features": [{
            "type": "Feature", "id": 1, "geometry": square(0.0, 0.0, 1.0, 1.0)
        }] });
        let err = parse_edits(FeatureKind::BuildingLimit, &missing_version).unwrap_err();
        assert!(matches!(err, SplitError::Format(ref msg) if msg.contains("no version")));

        let duplicated = json!({ "features": [
            { "type": "Feature", "id": 1, "version": 1, "geometry": square(0.0, 0.0, 1.0, 1.0) },
            { "type": "Feature", "id": 1, "version": 1, "geometry": square(0.0, 0.0, 1.0, 1.0) }
        ] });
        let err = parse_edits(FeatureKind::BuildingLimit, &duplicated).unwrap_err();
        assert!(matches!(err, SplitError::Format(ref msg) if msg.contains("more than once")));
    }

    #[test]
    fn test_internal_errors() {
        assert!(ProjectError::Store("down".to_string()).is_internal());
        assert!(!ProjectError::NotFound(ProjectId::new(1)).is_internal());
        assert!(ProjectError::from(SplitError::UnmatchedFragment {
            fragment: 0,
            missing: FeatureKind::BuildingLimit,
        })
        .is_internal());
    }
}
