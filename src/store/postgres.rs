//! PostgreSQL project store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Locking
//!
//! Each transaction takes `pg_advisory_xact_lock(project_id)` before reading,
//! so concurrent operations on one project serialize while other projects
//! proceed. The lock is released on commit or rollback.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;

use crate::geometry::{geometry_to_polygon, polygon_to_geometry};
use crate::split::SplitError;
use crate::types::{
    BuildingLimit, FeatureId, Geometry, HeightPlateau, ProjectId, ProjectSnapshot, SplitFragment,
};
use super::{ProjectStore, ProjectTransaction};

/// Building limits table.
pub const BUILDING_LIMITS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS building_limits (
    project_id BIGINT NOT NULL,
    id BIGINT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    geometry JSONB NOT NULL,
    name TEXT,
    PRIMARY KEY (project_id, id)
)
"#;

/// Height plateaus table.
pub const HEIGHT_PLATEAUS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS height_plateaus (
    project_id BIGINT NOT NULL,
    id BIGINT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    elevation DOUBLE PRECISION NOT NULL,
    geometry JSONB NOT NULL,
    name TEXT,
    PRIMARY KEY (project_id, id)
)
"#;

/// Split fragments table.
pub const SPLIT_BUILDING_LIMITS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS split_building_limits (
    project_id BIGINT NOT NULL,
    id BIGINT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    elevation DOUBLE PRECISION NOT NULL,
    geometry JSONB NOT NULL,
    building_limit_id BIGINT NOT NULL,
    height_plateau_id BIGINT NOT NULL,
    PRIMARY KEY (project_id, id),
    FOREIGN KEY (project_id, building_limit_id) REFERENCES building_limits (project_id, id),
    FOREIGN KEY (project_id, height_plateau_id) REFERENCES height_plateaus (project_id, id)
)
"#;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/plateau_split".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored geometry no longer parses as a valid polygon.
    #[error("Stored geometry is corrupt: {0}")]
    CorruptGeometry(#[from] SplitError),
    /// A snapshot for another project was committed through this transaction.
    #[error("Snapshot for project {found} committed to project {expected}")]
    ProjectMismatch {
        /// Project held by the transaction.
        expected: ProjectId,
        /// Project named by the snapshot.
        found: ProjectId,
    },
}

/// PostgreSQL project store.
pub struct PostgresProjectStore {
    pool: PgPool,
}

impl PostgresProjectStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the project tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in [
            BUILDING_LIMITS_TABLE_SCHEMA,
            HEIGHT_PLATEAUS_TABLE_SCHEMA,
            SPLIT_BUILDING_LIMITS_TABLE_SCHEMA,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }
}

#[async_trait]
impl ProjectStore for PostgresProjectStore {
    type Error = PostgresError;
    type Transaction = PostgresTransaction;

    async fn begin(&self, project_id: ProjectId) -> Result<Self::Transaction, Self::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(project_id.get())
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTransaction { project_id, tx })
    }
}

/// Database transaction holding the project's advisory lock.
///
/// Dropping it without `commit`/`delete` rolls back.
pub struct PostgresTransaction {
    project_id: ProjectId,
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn clear(&mut self) -> Result<(), sqlx::Error> {
        // Fragments reference limits and plateaus, so they go first.
        for table in ["split_building_limits", "building_limits", "height_plateaus"] {
            sqlx::query(&format!("DELETE FROM {} WHERE project_id = $1", table))
                .bind(self.project_id.get())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    fn parse_geometry(row: &PgRow) -> Result<geo::Polygon<f64>, PostgresError> {
        let Json(geometry): Json<Geometry> = row.try_get("geometry")?;
        Ok(geometry_to_polygon(&geometry)?)
    }

    fn parse_limit_row(row: &PgRow) -> Result<BuildingLimit, PostgresError> {
        let id: i64 = row.try_get("id")?;
        let version: i32 = row.try_get("version")?;
        let name: Option<String> = row.try_get("name")?;
        Ok(BuildingLimit {
            id: FeatureId::new(id),
            version: version as u32,
            geometry: Self::parse_geometry(row)?,
            name,
        })
    }

    fn parse_plateau_row(row: &PgRow) -> Result<HeightPlateau, PostgresError> {
        let id: i64 = row.try_get("id")?;
        let version: i32 = row.try_get("version")?;
        let elevation: f64 = row.try_get("elevation")?;
        let name: Option<String> = row.try_get("name")?;
        Ok(HeightPlateau {
            id: FeatureId::new(id),
            version: version as u32,
            elevation,
            geometry: Self::parse_geometry(row)?,
            name,
        })
    }

    fn parse_fragment_row(row: &PgRow) -> Result<SplitFragment, PostgresError> {
        let id: i64 = row.try_get("id")?;
        let version: i32 = row.try_get("version")?;
        let elevation: f64 = row.try_get("elevation")?;
        let building_limit_id: i64 = row.try_get("building_limit_id")?;
        let height_plateau_id: i64 = row.try_get("height_plateau_id")?;
        Ok(SplitFragment {
            id: FeatureId::new(id),
            version: version as u32,
            elevation,
            geometry: Self::parse_geometry(row)?,
            building_limit_id: FeatureId::new(building_limit_id),
            height_plateau_id: FeatureId::new(height_plateau_id),
        })
    }
}

#[async_trait]
impl ProjectTransaction for PostgresTransaction {
    type Error = PostgresError;

    async fn load(&mut self) -> Result<Option<ProjectSnapshot>, Self::Error> {
        let project = self.project_id.get();

        let limit_rows = sqlx::query(
            r#"
            SELECT id, version, geometry, name
            FROM building_limits
            WHERE project_id = $1
            ORDER BY id
            "#
        )
        .bind(project)
        .fetch_all(&mut *self.tx)
        .await?;

        let plateau_rows = sqlx::query(
            r#"
            SELECT id, version, elevation, geometry, name
            FROM height_plateaus
            WHERE project_id = $1
            ORDER BY id
            "#
        )
        .bind(project)
        .fetch_all(&mut *self.tx)
        .await?;

        if limit_rows.is_empty() && plateau_rows.is_empty() {
            return Ok(None);
        }

        let fragment_rows = sqlx::query(
            r#"
            SELECT id, version, elevation, geometry, building_limit_id, height_plateau_id
            FROM split_building_limits
            WHERE project_id = $1
            ORDER BY id
            "#
        )
        .bind(project)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(ProjectSnapshot {
            project_id: self.project_id,
            building_limits: limit_rows
                .iter()
                .map(Self::parse_limit_row)
                .collect::<Result<_, _>>()?,
            height_plateaus: plateau_rows
                .iter()
                .map(Self::parse_plateau_row)
                .collect::<Result<_, _>>()?,
            split_fragments: fragment_rows
                .iter()
                .map(Self::parse_fragment_row)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn commit(mut self, snapshot: ProjectSnapshot) -> Result<(), Self::Error> {
        if snapshot.project_id != self.project_id {
            return Err(PostgresError::ProjectMismatch {
                expected: self.project_id,
                found: snapshot.project_id,
            });
        }
        let project = self.project_id.get();

        self.clear().await?;

        for limit in &snapshot.building_limits {
            sqlx::query(
                r#"
                INSERT INTO building_limits (project_id, id, version, geometry, name)
                VALUES ($1, $2, $3, $4, $5)
                "#
            )
            .bind(project)
            .bind(limit.id.get())
            .bind(limit.version as i32)
            .bind(Json(polygon_to_geometry(&limit.geometry)))
            .bind(&limit.name)
            .execute(&mut *self.tx)
            .await?;
        }

        for plateau in &snapshot.height_plateaus {
            sqlx::query(
                r#"
                INSERT INTO height_plateaus (project_id, id, version, elevation, geometry, name)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#
            )
            .bind(project)
            .bind(plateau.id.get())
            .bind(plateau.version as i32)
            .bind(plateau.elevation)
            .bind(Json(polygon_to_geometry(&plateau.geometry)))
            .bind(&plateau.name)
            .execute(&mut *self.tx)
            .await?;
        }

        for fragment in &snapshot.split_fragments {
            sqlx::query(
                r#"
                INSERT INTO split_building_limits
                    (project_id, id, version, elevation, geometry, building_limit_id, height_plateau_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#
            )
            .bind(project)
            .bind(fragment.id.get())
            .bind(fragment.version as i32)
            .bind(fragment.elevation)
            .bind(Json(polygon_to_geometry(&fragment.geometry)))
            .bind(fragment.building_limit_id.get())
            .bind(fragment.height_plateau_id.get())
            .execute(&mut *self.tx)
            .await?;
        }

        self.tx.commit().await?;
        Ok(())
    }

    async fn delete(mut self) -> Result<(), Self::Error> {
        self.clear().await?;
        self.tx.commit().await?;
        Ok(())
    }
}
