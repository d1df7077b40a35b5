//! Axum routes for the project service.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::project::{ProjectError, ProjectUpdate, UpdatedVersion};
use crate::split::SplitError;
use crate::store::{PostgresProjectStore, ProjectStore};
use crate::types::{FeatureCollection, ProjectId, ProjectSnapshot};

use super::middleware::record_split_metrics;
use super::state::{DatabaseHealth, HealthProbe, ServiceState};

/// Type alias for the service state with PostgresProjectStore.
pub type AppState = ServiceState<PostgresProjectStore>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?project_id=` query parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProjectQuery {
    /// Target project.
    pub project_id: i64,
}

/// Request to create a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    /// Building limits feature collection.
    pub building_limits: Value,
    /// Height plateaus feature collection.
    pub height_plateaus: Value,
}

/// Full project contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    /// Project id.
    pub project_id: ProjectId,
    /// Building limits with ids and versions.
    pub building_limits: FeatureCollection,
    /// Height plateaus with ids and versions.
    pub height_plateaus: FeatureCollection,
    /// Recomputed split fragments.
    pub split_building_limits: FeatureCollection,
}

impl From<&ProjectSnapshot> for ProjectResponse {
    fn from(snapshot: &ProjectSnapshot) -> Self {
        Self {
            project_id: snapshot.project_id,
            building_limits: snapshot.building_limits_collection(),
            height_plateaus: snapshot.height_plateaus_collection(),
            split_building_limits: snapshot.split_fragments_collection(),
        }
    }
}

/// Response to an accepted update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProjectResponse {
    /// Project state after the update.
    #[serde(flatten)]
    pub project: ProjectResponse,
    /// New versions of edited entities.
    pub updated: Vec<UpdatedVersion>,
}

/// Service health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// A project error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProjectError);

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status and error code for the wrapped error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            ProjectError::Split(SplitError::Format(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_GEOJSON"),
            ProjectError::Split(SplitError::Geometry(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_GEOMETRY"),
            ProjectError::Split(SplitError::Overlap { .. }) => (StatusCode::UNPROCESSABLE_ENTITY, "PLATEAU_OVERLAP"),
            ProjectError::Split(SplitError::Coverage { .. }) => (StatusCode::UNPROCESSABLE_ENTITY, "INCOMPLETE_COVERAGE"),
            ProjectError::Split(SplitError::UnmatchedFragment { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNMATCHED_FRAGMENT")
            }
            ProjectError::Conflict(_) => (StatusCode::CONFLICT, "PROJECT_EXISTS"),
            ProjectError::VersionConflict { .. } => (StatusCode::CONFLICT, "VERSION_CONFLICT"),
            ProjectError::NotFound(_) => (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND"),
            ProjectError::FeatureNotFound { .. } => (StatusCode::NOT_FOUND, "FEATURE_NOT_FOUND"),
            ProjectError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_FAILURE"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if self.0.is_internal() {
            tracing::error!(code = code, error = %self.0, "Request failed");
        } else {
            tracing::warn!(code = code, error = %self.0, "Request rejected");
        }
        (status, Json(ErrorResponse::new(code, self.0.to_string()))).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Create a project and compute its fragments.
async fn create_project_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(query): Query<ProjectQuery>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    let start = Instant::now();
    let snapshot = state
        .projects
        .create(
            ProjectId::new(query.project_id),
            &request.building_limits,
            &request.height_plateaus,
        )
        .await?;
    record_split_metrics(
        "create",
        snapshot.split_fragments.len(),
        start.elapsed().as_millis() as u64,
    );
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(&snapshot))))
}

/// Apply versioned edits and recompute fragments.
async fn update_project_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(query): Query<ProjectQuery>,
    Json(update): Json<ProjectUpdate>,
) -> Result<Json<UpdateProjectResponse>, ApiError> {
    let start = Instant::now();
    let outcome = state
        .projects
        .update(ProjectId::new(query.project_id), &update)
        .await?;
    record_split_metrics(
        "update",
        outcome.snapshot.split_fragments.len(),
        start.elapsed().as_millis() as u64,
    );
    Ok(Json(UpdateProjectResponse {
        project: ProjectResponse::from(&outcome.snapshot),
        updated: outcome.updated,
    }))
}

/// Delete a project.
async fn delete_project_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(query): Query<ProjectQuery>,
) -> Result<StatusCode, ApiError> {
    state.projects.delete(ProjectId::new(query.project_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn building_limits_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(project_id): Path<i64>,
) -> Result<Json<FeatureCollection>, ApiError> {
    Ok(Json(state.projects.building_limits(ProjectId::new(project_id)).await?))
}

async fn height_plateaus_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(project_id): Path<i64>,
) -> Result<Json<FeatureCollection>, ApiError> {
    Ok(Json(state.projects.height_plateaus(ProjectId::new(project_id)).await?))
}

async fn split_building_limits_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(project_id): Path<i64>,
) -> Result<Json<FeatureCollection>, ApiError> {
    Ok(Json(state.projects.split_fragments(ProjectId::new(project_id)).await?))
}

/// Health check endpoint, including database health when there is one.
async fn health_handler<S: ProjectStore + HealthProbe + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let database = state.projects.store().database_health().await;
    let healthy = database.as_ref().map_or(true, |db| db.connected);

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the project service.
pub fn create_router<S: ProjectStore + HealthProbe + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Project lifecycle
        .route("/create-project", post(create_project_handler::<S>))
        .route("/update-project", put(update_project_handler::<S>))
        .route("/delete-project", delete(delete_project_handler::<S>))
        // Reads
        .route("/building-limits/:project_id", get(building_limits_handler::<S>))
        .route("/height-plateaus/:project_id", get(height_plateaus_handler::<S>))
        .route("/split-building-limits/:project_id", get(split_building_limits_handler::<S>))
        .route("/health", get(health_handler::<S>))
        .with_state(state)
}
