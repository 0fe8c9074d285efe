//! Workspace storage.
//!
//! A workspace is the server-side state of one loaded chat page: a
//! [`Controller`] keyed by its id. Loading the page creates a new workspace,
//! so a reload starts over with fresh sessions and a fresh interaction
//! counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::backend::ChatBackend;
use crate::controller::{Controller, ControllerSettings};
use crate::error::AppError;

/// Thread-safe store for workspaces.
#[derive(Clone)]
pub struct WorkspaceStore {
    inner: Arc<WorkspaceStoreInner>,
}

struct WorkspaceStoreInner {
    workspaces: RwLock<HashMap<String, Controller>>,
    backend: Arc<dyn ChatBackend>,
    settings: ControllerSettings,
}

impl std::fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("workspaces", &self.len())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl WorkspaceStore {
    /// Create an empty store whose workspaces share `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ControllerSettings) -> Self {
        Self {
            inner: Arc::new(WorkspaceStoreInner {
                workspaces: RwLock::new(HashMap::new()),
                backend,
                settings,
            }),
        }
    }

    /// Create a new workspace and return its controller.
    #[must_use]
    pub fn create(&self) -> Controller {
        let controller = Controller::new(Arc::clone(&self.inner.backend), self.inner.settings);
        self.inner
            .workspaces
            .write()
            .insert(controller.id().to_string(), controller.clone());
        tracing::debug!(workspace_id = %controller.id(), "Workspace created");
        controller
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Controller> {
        self.inner.workspaces.read().get(id).cloned()
    }

    /// Like [`get`](Self::get), as an API error when missing.
    pub fn require(&self, id: &str) -> Result<Controller, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::WorkspaceNotFound(id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.workspaces.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop workspaces idle longer than `timeout`.
    ///
    /// Workspaces with a connected page or a reply in flight are kept.
    /// Returns the number removed.
    pub fn cleanup_idle(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.workspaces.write();
        let before = guard.len();
        guard.retain(|_, c| {
            c.subscriber_count() > 0 || c.is_loading() || c.idle_for() <= timeout
        });
        before - guard.len()
    }

    /// Periodically run [`cleanup_idle`](Self::cleanup_idle).
    pub fn spawn_sweeper(&self, every: Duration, timeout: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.cleanup_idle(timeout);
                if removed > 0 {
                    tracing::info!(removed, remaining = store.len(), "Evicted idle workspaces");
                }
            }
        })
    }
}
