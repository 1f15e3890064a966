//! Runtime identifier lookup by host pid

use crate::error::{ReconcileError, Result};
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::debug;

/// Resolves the runtime id of the container whose root process has a pid
///
/// Every lookup lists the running containers and inspects them one by one;
/// results are not cached because pids are reused as containers are
/// recreated.
#[derive(Clone)]
pub struct ContainerLocator {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerLocator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn find_runtime_id(&self, pid: u32) -> Result<String> {
        let ids = self.runtime.list_running().await?;

        for id in ids {
            match self.runtime.root_pid(&id).await {
                Ok(root_pid) if root_pid == pid => return Ok(id),
                Ok(_) => {}
                Err(e) => {
                    debug!(id = %id, error = %e, "Skipping container that could not be inspected");
                }
            }
        }

        Err(ReconcileError::LocatorNotFound(pid))
    }
}
