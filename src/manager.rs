//! # Container Deployment Manager
//!
//! The single [`DeploymentManager`] implementation. It holds no state of its
//! own beyond the runtime handle and naming rules: every answer is derived
//! from what the runtime reports at call time, decoded through the label
//! codec.
//!
//! ## Deploy Flow
//!
//! ```text
//!   validate ─▶ parse action ─▶ build spec ─▶ ensure network
//!                                                  │
//!                    ┌── replace ──▶ remove existing (volumes kept)
//!                    ▼
//!                 create ─▶ start ──fail──▶ remove created container
//!                              │
//!                              ▼
//!                          inspect ─▶ decode ─▶ Deployment
//! ```
//!
//! ## Scoping
//!
//! Every lookup goes through the identity selector (managed + project +
//! type + id), so a service id never resolves a job and vice versa, and no
//! operation reaches across projects.

use crate::actions::{self, DeployAction};
use crate::builder::{Naming, SpecBuilder};
use crate::config::ManagerConfig;
use crate::deployment::{
    Deployment, DeploymentManager, DeploymentType, Job, JobInput, ResourceAction, Service,
    ServiceInput, WorkloadInput, validate_project_id,
};
use crate::error::{Error, Result};
use crate::labels::{self, identity_selector, project_selector};
use crate::logs;
use crate::network::NetworkProvisioner;
use crate::runtime::{ContainerInfo, ContainerRuntime, LogQuery, RuntimeResult};
use crate::runtimes::RuntimeHandle;
use crate::translate::{Operation, degrade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Deployment manager over any [`ContainerRuntime`].
#[derive(Debug, Clone)]
pub struct ContainerDeploymentManager {
    handle: RuntimeHandle,
    builder: SpecBuilder,
    networks: NetworkProvisioner,
}

impl ContainerDeploymentManager {
    /// Connects to the configured backend and builds a manager.
    ///
    /// # Errors
    ///
    /// - `Config` if the configuration is invalid
    /// - `BackendFailure` if the backend cannot be reached
    pub async fn connect(config: &ManagerConfig) -> Result<Self> {
        config.validate()?;
        let handle = RuntimeHandle::connect(&config.backend).await?;
        Ok(Self::assemble(handle, config))
    }

    /// Builds a manager over an existing runtime handle.
    ///
    /// # Errors
    ///
    /// `Config` if the namespace is invalid.
    pub fn new(handle: RuntimeHandle, config: &ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(handle, config))
    }

    /// Wires the manager from an already validated configuration.
    fn assemble(handle: RuntimeHandle, config: &ManagerConfig) -> Self {
        let naming = Naming::new(config.namespace.clone());
        let networks = NetworkProvisioner::new(Arc::clone(handle.runtime()), naming.clone());
        Self {
            handle,
            builder: SpecBuilder::new(naming),
            networks,
        }
    }

    /// Returns the underlying runtime.
    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        self.handle.runtime()
    }

    /// Returns the project network provisioner.
    pub fn network_provisioner(&self) -> &NetworkProvisioner {
        &self.networks
    }

    /// Releases the runtime handle.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }

    async fn list(&self, kind: DeploymentType, project_id: &str) -> RuntimeResult<Vec<Deployment>> {
        let containers = self
            .runtime()
            .list_containers(&project_selector(project_id, kind))
            .await?;

        Ok(labels::decode_all(&containers)
            .into_iter()
            .filter(|d| d.deployment_type == kind && d.project_id == project_id)
            .collect())
    }

    /// Finds the container holding an identity. The newest one wins if the
    /// runtime somehow reports several.
    async fn locate(
        &self,
        kind: DeploymentType,
        project_id: &str,
        id: &str,
    ) -> Result<(ContainerInfo, Deployment)> {
        let op = Operation::Lookup {
            kind,
            project_id,
            id,
        };
        let containers = self
            .runtime()
            .list_containers(&identity_selector(project_id, kind, id))
            .await
            .map_err(|e| op.translate(e))?;

        containers
            .into_iter()
            .filter_map(|info| match labels::to_deployment(&info) {
                Ok(d) if d.deployment_type == kind && d.deployment_id == id => Some((info, d)),
                Ok(_) => None,
                Err(e) => {
                    warn!(container = %info.name, error = %e, "skipping undecodable container");
                    None
                }
            })
            .max_by_key(|(info, _)| info.created_at)
            .ok_or_else(|| Error::not_found(kind, project_id, id))
    }

    async fn actions(
        &self,
        kind: DeploymentType,
        project_id: &str,
        input: &WorkloadInput,
    ) -> Result<Vec<ResourceAction>> {
        validate_project_id(project_id)?;
        input.validate()?;

        let spec = self.builder.build(project_id, kind, input)?;
        let deployment_id = input.deployment_id()?;
        let op = Operation::ListActions { kind, project_id };

        let existing = self
            .runtime()
            .list_containers(&identity_selector(project_id, kind, &deployment_id))
            .await
            .map_err(|e| op.translate(e))?;
        let network_exists = self
            .networks
            .find_project_network(project_id)
            .await
            .map_err(|e| op.translate(e))?
            .is_some();

        Ok(actions::plan(
            kind,
            &input.display_name,
            &spec,
            &existing,
            network_exists,
        ))
    }

    #[instrument(skip(self, input), fields(display_name = %input.display_name))]
    async fn deploy(
        &self,
        kind: DeploymentType,
        project_id: &str,
        input: &WorkloadInput,
        action_id: Option<&str>,
    ) -> Result<Deployment> {
        validate_project_id(project_id)?;
        input.validate()?;
        let action = DeployAction::from_action_id(action_id)?;
        let spec = self.builder.build(project_id, kind, input)?;
        let deployment_id = input.deployment_id()?;

        self.networks
            .ensure_project_network(project_id)
            .await
            .map_err(|e| Operation::EnsureNetwork { project_id }.translate(e))?;

        let op = Operation::deploy(kind, &input.display_name);
        let runtime = self.runtime();

        if action == DeployAction::Replace {
            let existing = runtime
                .list_containers(&identity_selector(project_id, kind, &deployment_id))
                .await
                .map_err(|e| op.translate(e))?;
            for container in &existing {
                runtime
                    .remove_container(&container.id, false)
                    .await
                    .map_err(|e| op.translate(e))?;
                info!(container = %container.name, "removed container for replacement");
            }
        }

        let container_id = runtime
            .create_container(&spec)
            .await
            .map_err(|e| op.translate(e))?;
        debug!(container = %spec.name, id = %container_id, "container created");

        if let Err(e) = runtime.start_container(&container_id).await {
            if let Err(cleanup) = runtime.remove_container(&container_id, false).await {
                warn!(container = %spec.name, error = %cleanup, "failed to roll back container");
            }
            return Err(op.translate(e));
        }

        let info = runtime
            .inspect_container(&container_id)
            .await
            .map_err(|e| op.translate(e))?;
        let deployment = labels::to_deployment(&info).map_err(|e| {
            Error::backend_failure(format!(
                "container {} lost its labels after creation: {e}",
                spec.name
            ))
        })?;

        info!(
            project_id,
            kind = %kind,
            deployment_id = %deployment.deployment_id,
            container = %spec.name,
            status = %deployment.status,
            "deployed"
        );
        Ok(deployment)
    }

    async fn metadata(&self, kind: DeploymentType, project_id: &str, id: &str) -> Result<Deployment> {
        self.locate(kind, project_id, id).await.map(|(_, d)| d)
    }

    async fn delete(
        &self,
        kind: DeploymentType,
        project_id: &str,
        id: &str,
        delete_volumes: bool,
    ) -> Result<()> {
        let (info, _) = self.locate(kind, project_id, id).await?;
        self.runtime()
            .remove_container(&info.id, delete_volumes)
            .await
            .map_err(|e| {
                Operation::Delete {
                    kind,
                    project_id,
                    id,
                }
                .translate(e)
            })?;

        info!(project_id, kind = %kind, deployment_id = id, delete_volumes, "deleted");
        Ok(())
    }

    async fn logs(
        &self,
        kind: DeploymentType,
        project_id: &str,
        id: &str,
        lines: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let (info, _) = self.locate(kind, project_id, id).await?;
        let query = LogQuery { tail: lines, since };
        let raw = self
            .runtime()
            .container_logs(&info.id, &query)
            .await
            .map_err(|e| {
                Operation::Logs {
                    kind,
                    project_id,
                    id,
                }
                .translate(e)
            })?;

        Ok(logs::render(&logs::select(raw, lines, since)))
    }
}

#[async_trait]
impl DeploymentManager for ContainerDeploymentManager {
    async fn list_services(&self, project_id: &str) -> Vec<Service> {
        match self.list(DeploymentType::Service, project_id).await {
            Ok(services) => services,
            Err(e) => degrade(Operation::ListServices { project_id }, e),
        }
    }

    async fn deploy_service(
        &self,
        project_id: &str,
        service: &ServiceInput,
        action_id: Option<&str>,
    ) -> Result<Service> {
        self.deploy(DeploymentType::Service, project_id, service, action_id)
            .await
    }

    async fn list_deploy_service_actions(
        &self,
        project_id: &str,
        service: &ServiceInput,
    ) -> Result<Vec<ResourceAction>> {
        self.actions(DeploymentType::Service, project_id, service)
            .await
    }

    async fn get_service_metadata(&self, project_id: &str, service_id: &str) -> Result<Service> {
        self.metadata(DeploymentType::Service, project_id, service_id)
            .await
    }

    async fn delete_service(
        &self,
        project_id: &str,
        service_id: &str,
        delete_volumes: bool,
    ) -> Result<()> {
        self.delete(DeploymentType::Service, project_id, service_id, delete_volumes)
            .await
    }

    async fn get_service_logs(
        &self,
        project_id: &str,
        service_id: &str,
        lines: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String> {
        self.logs(DeploymentType::Service, project_id, service_id, lines, since)
            .await
    }

    async fn list_jobs(&self, project_id: &str) -> Result<Vec<Job>> {
        self.list(DeploymentType::Job, project_id)
            .await
            .map_err(|e| Operation::ListJobs { project_id }.translate(e))
    }

    async fn deploy_job(
        &self,
        project_id: &str,
        job: &JobInput,
        action_id: Option<&str>,
    ) -> Result<Job> {
        self.deploy(DeploymentType::Job, project_id, job, action_id)
            .await
    }

    async fn list_deploy_job_actions(
        &self,
        project_id: &str,
        job: &JobInput,
    ) -> Result<Vec<ResourceAction>> {
        self.actions(DeploymentType::Job, project_id, job).await
    }

    async fn get_job_metadata(&self, project_id: &str, job_id: &str) -> Result<Job> {
        self.metadata(DeploymentType::Job, project_id, job_id).await
    }

    async fn delete_job(&self, project_id: &str, job_id: &str) -> Result<()> {
        self.delete(DeploymentType::Job, project_id, job_id, false)
            .await
    }

    async fn get_job_logs(
        &self,
        project_id: &str,
        job_id: &str,
        lines: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String> {
        self.logs(DeploymentType::Job, project_id, job_id, lines, since)
            .await
    }
}
