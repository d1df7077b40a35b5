//! Project storage backends.
//!
//! Every protocol operation runs inside one [`ProjectTransaction`]. `begin`
//! acquires exclusive access to a single project, so the read of current
//! versions, the conflict check and the final commit are atomic with respect
//! to other operations on the same project. Dropping a transaction without
//! committing rolls it back and releases the project.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{ProjectId, ProjectSnapshot};

/// Trait for project storage backends.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Transaction scoped to one project.
    type Transaction: ProjectTransaction<Error = Self::Error>;

    /// Start a transaction holding exclusive access to `project_id`.
    ///
    /// Waits while another transaction on the same project is open.
    async fn begin(&self, project_id: ProjectId) -> Result<Self::Transaction, Self::Error>;
}

/// Exclusive, all-or-nothing access to one project's entities.
#[async_trait]
pub trait ProjectTransaction: Send {
    /// Error type for transaction operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the stored project, or `None` when absent.
    async fn load(&mut self) -> Result<Option<ProjectSnapshot>, Self::Error>;

    /// Atomically replace all limits, plateaus and fragments of the project.
    async fn commit(self, snapshot: ProjectSnapshot) -> Result<(), Self::Error>;

    /// Atomically remove all entities of the project.
    async fn delete(self) -> Result<(), Self::Error>;
}

pub use memory::{InMemoryError, InMemoryProjectStore, InMemoryTransaction};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresError, PostgresProjectStore, PostgresTransaction};
