//! Project REST Service
//!
//! Exposes project create/update/delete and reads over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /create-project?project_id=` - Create a project and compute its fragments
//! - `PUT /update-project?project_id=` - Apply versioned edits
//! - `DELETE /delete-project?project_id=` - Delete a project
//! - `GET /building-limits/{project_id}` - Building limits with versions
//! - `GET /height-plateaus/{project_id}` - Height plateaus with versions
//! - `GET /split-building-limits/{project_id}` - Split fragments
//! - `GET /health` - Service and database health
//!
//! ## Status Codes
//!
//! Invalid input, overlapping plateaus and incomplete coverage are `422`;
//! duplicate creates and stale versions are `409`; unknown projects or
//! feature ids are `404`; internal inconsistencies and store failures are `500`.

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_split_metrics};
pub use routes::{create_router, ApiError, AppState, ErrorResponse};
pub use state::{DatabaseHealth, HealthProbe, ServiceState};
