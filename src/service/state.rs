//! Service state management.
//!
//! Holds the project service and a health probe for the backing store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SplitConfig;
use crate::project::ProjectService;
use crate::store::{InMemoryProjectStore, PostgresProjectStore, ProjectStore};

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// Whether `SELECT 1` succeeded.
    pub connected: bool,
    /// Current pool size.
    pub pool_size: u32,
    /// Idle connections.
    pub pool_idle: usize,
    /// Maximum pool size.
    pub pool_max: u32,
}

/// Stores that can report their own health.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Database health, or `None` for stores without a database.
    async fn database_health(&self) -> Option<DatabaseHealth>;
}

#[async_trait]
impl HealthProbe for InMemoryProjectStore {
    async fn database_health(&self) -> Option<DatabaseHealth> {
        None
    }
}

#[async_trait]
impl HealthProbe for PostgresProjectStore {
    async fn database_health(&self) -> Option<DatabaseHealth> {
        let connected = self.is_healthy().await;
        let stats = self.pool_stats();
        Some(DatabaseHealth {
            connected,
            pool_size: stats.size,
            pool_idle: stats.idle,
            pool_max: stats.max,
        })
    }
}

/// Shared service state.
pub struct ServiceState<S: ProjectStore + 'static> {
    /// Project operations.
    pub projects: ProjectService<S>,
}

impl<S: ProjectStore + 'static> ServiceState<S> {
    /// Create service state over a store with the given tolerances.
    pub fn new(store: S, config: SplitConfig) -> Self {
        Self {
            projects: ProjectService::new(Arc::new(store), config),
        }
    }

    /// Create service state with tolerances read from the environment.
    pub fn from_env(store: S) -> Self {
        let config = SplitConfig::from_env();
        tracing::info!(
            overlap_area_tolerance = config.overlap_area_tolerance,
            coverage_buffer = config.coverage_buffer,
            match_buffer = config.match_buffer,
            min_fragment_area = config.min_fragment_area,
            "Split tolerances loaded"
        );
        Self::new(store, config)
    }
}

impl<S: ProjectStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            projects: self.projects.clone(),
        }
    }
}
