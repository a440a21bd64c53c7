//! # workload-deploy
//!
//! **Project-Scoped Deployment Manager over Container Runtimes**
//!
//! Turns platform-level workload descriptors (Services and Jobs owned by a
//! project) into container-runtime operations, and turns runtime state back
//! into platform views. The runtime is the only store: identity lives in
//! container labels and is decoded on every read.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         workload-deploy                             │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                 DeploymentManager Trait                     │    │
//! │  │   list → actions → deploy → metadata / logs → delete        │    │
//! │  │          (services and jobs, scoped by project id)          │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │                              │                                      │
//! │  ┌──────────────┬──────────────┬──────────────┬──────────────┐      │
//! │  │ Spec Builder │ Label Codec  │ Networks     │ Translator   │      │
//! │  │ names, limits│ identity <-> │ get-or-create│ RuntimeError │      │
//! │  │ on-failure/no│ labels       │ per project  │ -> Error     │      │
//! │  └──────────────┴──────────────┴──────────────┴──────────────┘      │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                      ContainerRuntime Trait                         │
//! │  ┌──────────────────────┐            ┌──────────────────────┐       │
//! │  │    DockerRuntime     │            │    MemoryRuntime     │       │
//! │  │  docker CLI, labels  │            │  in-process, tests   │       │
//! │  └──────────────────────┘            └──────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identity
//!
//! A deployment is identified by `(project_id, deployment_type,
//! deployment_id)`. All three are written as labels at creation
//! ([`labels`]) and every lookup filters on all three, so a service id can
//! never resolve a job and no call reaches into another project.
//!
//! # Error Model
//!
//! | Operation        | Backend failure becomes |
//! |------------------|-------------------------|
//! | `list_services`  | empty list              |
//! | `list_jobs`      | `BackendFailure`        |
//! | `deploy_service` | `InvalidRequest`        |
//! | `deploy_job`     | `BackendFailure`        |
//! | others           | `NotFound` / `BackendFailure` |
//!
//! # Example
//!
//! ```rust,ignore
//! use workload_deploy::{ContainerDeploymentManager, DeploymentManager, ManagerConfig, ServiceInput};
//!
//! #[tokio::main]
//! async fn main() -> workload_deploy::Result<()> {
//!     let config = ManagerConfig::from_env()?;
//!     let manager = ContainerDeploymentManager::connect(&config).await?;
//!
//!     let web = ServiceInput::new("web", "nginx:latest");
//!     let service = manager.deploy_service("proj1", &web, None).await?;
//!     println!("{} is {}", service.deployment_id, service.status);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod builder;
pub mod config;
pub mod constants;
pub mod deployment;
pub mod error;
pub mod labels;
pub mod logs;
pub mod manager;
pub mod network;
pub mod runtime;
pub mod translate;

pub mod runtimes;

// Re-exports
pub use actions::{DEPLOY_ACTION_ID, DeployAction, REPLACE_ACTION_ID};
pub use builder::{Naming, SpecBuilder};
pub use config::{BackendConfig, ManagerConfig};
pub use deployment::{
    Deployment, DeploymentManager, DeploymentStatus, DeploymentType, Endpoint, Job, JobInput,
    Protocol, ResourceAction, ResourceLimits, Service, ServiceInput, WorkloadInput,
};
pub use error::{Error, Result};
pub use labels::{DeploymentLabels, LabelError};
pub use manager::ContainerDeploymentManager;
pub use network::NetworkProvisioner;
pub use runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, ContainerState, Labels, LogLine, LogQuery,
    NetworkInfo, RestartPolicy, RuntimeError, RuntimeResult, VolumeMount,
};
pub use runtimes::{DockerRuntime, MemoryRuntime, RuntimeHandle};
