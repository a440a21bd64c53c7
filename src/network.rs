//! # Network Provisioner
//!
//! Ensures the per-project isolated network exists before any of the
//! project's containers is created.
//!
//! ## Get-or-Create
//!
//! ```text
//!   inspect(name) ──found──▶ done
//!        │
//!      absent
//!        ▼
//!   create(name) ──ok──▶ done
//!        │
//!   AlreadyExists (lost a race with a concurrent first deploy)
//!        ▼
//!   inspect(name) ──found──▶ done
//! ```
//!
//! Losing the race is not an error for either caller. Networks are never
//! deleted here.

use crate::builder::Naming;
use crate::labels::network_labels;
use crate::runtime::{ContainerRuntime, NetworkInfo, RuntimeError, RuntimeResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Get-or-create for project networks.
#[derive(Clone)]
pub struct NetworkProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
    naming: Naming,
}

impl std::fmt::Debug for NetworkProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkProvisioner")
            .field("backend", &self.runtime.name())
            .field("naming", &self.naming)
            .finish()
    }
}

impl NetworkProvisioner {
    /// Creates a provisioner over `runtime` naming networks by `naming`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, naming: Naming) -> Self {
        Self { runtime, naming }
    }

    /// Name of the project's network (whether or not it exists yet).
    pub fn network_name(&self, project_id: &str) -> String {
        self.naming.project_network(project_id)
    }

    /// Returns the project network if it exists. Read-only.
    pub async fn find_project_network(&self, project_id: &str) -> RuntimeResult<Option<NetworkInfo>> {
        self.runtime
            .inspect_network(&self.network_name(project_id))
            .await
    }

    /// Ensures the project network exists and returns it.
    ///
    /// Safe to call concurrently for the same project: exactly one network
    /// results and neither caller sees an error from the lost race.
    ///
    /// # Errors
    ///
    /// Any runtime failure other than the benign `AlreadyExists` race.
    pub async fn ensure_project_network(&self, project_id: &str) -> RuntimeResult<NetworkInfo> {
        let name = self.network_name(project_id);

        if let Some(network) = self.runtime.inspect_network(&name).await? {
            debug!(network = %name, "project network already present");
            return Ok(network);
        }

        match self
            .runtime
            .create_network(&name, &network_labels(project_id))
            .await
        {
            Ok(network) => {
                info!(network = %name, project_id, "created project network");
                Ok(network)
            }
            Err(e) if e.is_already_exists() => {
                debug!(network = %name, "network created concurrently, reusing it");
                self.runtime
                    .inspect_network(&name)
                    .await?
                    .ok_or(RuntimeError::NetworkNotFound(name))
            }
            Err(e) => Err(e),
        }
    }
}
