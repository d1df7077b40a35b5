//! In-memory project store for testing and embedding.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::{ProjectId, ProjectSnapshot};
use super::{ProjectStore, ProjectTransaction};

/// Error type for in-memory store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InMemoryError {
    /// A snapshot for another project was committed through this transaction.
    #[error("Snapshot for project {found} committed to project {expected}")]
    ProjectMismatch {
        /// Project held by the transaction.
        expected: ProjectId,
        /// Project named by the snapshot.
        found: ProjectId,
    },
}

type Slot = Arc<AsyncMutex<Option<ProjectSnapshot>>>;
type Registry = Arc<Mutex<BTreeMap<ProjectId, Slot>>>;

/// In-memory project store.
///
/// Each project lives in its own async mutex; a transaction owns the guard
/// for its whole lifetime. Slots of absent projects are removed once no
/// transaction holds or awaits them. Uses a BTreeMap for deterministic
/// iteration order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectStore {
    projects: Registry,
}

impl InMemoryProjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, project_id: ProjectId) -> Slot {
        let mut projects = self.projects.lock();
        Arc::clone(projects.entry(project_id).or_default())
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    type Error = InMemoryError;
    type Transaction = InMemoryTransaction;

    async fn begin(&self, project_id: ProjectId) -> Result<Self::Transaction, Self::Error> {
        // Registry lock is released before waiting on the project.
        let slot = self.slot(project_id);
        let guard = slot.lock_owned().await;
        Ok(InMemoryTransaction {
            project_id,
            guard,
            registry: Arc::clone(&self.projects),
        })
    }
}

/// Transaction over one in-memory project.
///
/// Changes are applied only by `commit` or `delete`; a dropped transaction
/// leaves the project untouched.
pub struct InMemoryTransaction {
    project_id: ProjectId,
    guard: OwnedMutexGuard<Option<ProjectSnapshot>>,
    registry: Registry,
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }
        // Slots are cloned only under the registry lock, so a count of two
        // (registry and this guard) means nobody else is waiting.
        let mut projects = self.registry.lock();
        let idle = projects
            .get(&self.project_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 2);
        if idle {
            projects.remove(&self.project_id);
        }
    }
}

#[async_trait]
impl ProjectTransaction for InMemoryTransaction {
    type Error = InMemoryError;

    async fn load(&mut self) -> Result<Option<ProjectSnapshot>, Self::Error> {
        Ok((*self.guard).clone())
    }

    async fn commit(mut self, snapshot: ProjectSnapshot) -> Result<(), Self::Error> {
        if snapshot.project_id != self.project_id {
            return Err(InMemoryError::ProjectMismatch {
                expected: self.project_id,
                found: snapshot.project_id,
            });
        }
        *self.guard = Some(snapshot);
        Ok(())
    }

    async fn delete(mut self) -> Result<(), Self::Error> {
        *self.guard = None;
        Ok(())
    }
}
