//! Container runtime backends.
//!
//! Each backend implements [`ContainerRuntime`](crate::runtime::ContainerRuntime)
//! for one kind of container host. The manager never names a backend type:
//! it holds a [`RuntimeHandle`] built from [`BackendConfig`].

pub mod docker;
pub mod memory;

pub use self::docker::DockerRuntime;
pub use self::memory::MemoryRuntime;

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handle to the process's container runtime.
///
/// Constructed once at startup and released with [`RuntimeHandle::shutdown`].
/// Cloning shares the same backend.
#[derive(Clone)]
pub struct RuntimeHandle {
    runtime: Arc<dyn ContainerRuntime>,
}

impl RuntimeHandle {
    /// Wraps an already-constructed backend.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Connects to the configured backend.
    ///
    /// The Docker backend is probed once; an unreachable daemon fails here
    /// rather than on the first deploy.
    ///
    /// # Errors
    ///
    /// `BackendFailure` if the backend cannot be reached.
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let runtime: Arc<dyn ContainerRuntime> = match config {
            BackendConfig::Docker { binary, host } => {
                let docker = DockerRuntime::new(binary.clone(), host.clone());
                docker.probe().await.map_err(|e| {
                    Error::backend_failure(format!("docker runtime unavailable: {e}"))
                })?;
                Arc::new(docker)
            }
            BackendConfig::Memory => Arc::new(MemoryRuntime::new()),
        };

        info!(backend = runtime.name(), "connected to container runtime");
        Ok(Self { runtime })
    }

    /// Returns the backend.
    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Releases the backend connection.
    pub async fn shutdown(self) {
        let name = self.runtime.name().to_string();
        if let Err(e) = self.runtime.shutdown().await {
            warn!(backend = %name, error = %e, "runtime shutdown failed");
        } else {
            info!(backend = %name, "container runtime released");
        }
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("backend", &self.runtime.name())
            .finish()
    }
}
