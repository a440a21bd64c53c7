//! # Deployments - Services and Jobs
//!
//! Domain types and the [`DeploymentManager`] contract.
//!
//! ## Object Model
//!
//! ```text
//!   WorkloadInput ──deploy──▶ container (labels) ──decode──▶ Deployment
//!   (ephemeral)               (system of record)            (derived)
//! ```
//!
//! A [`Deployment`] is never cached: each call re-reads the runtime and
//! decodes the container's labels. The runtime is the only source of truth.
//!
//! ## Identity
//!
//! A deployment is identified by `(project_id, deployment_type,
//! deployment_id)`. The deployment id is the slug of the display name, and
//! the type is part of every lookup, so a Service and a Job may share an id
//! within one project.

mod input;
mod model;
mod traits;

pub use input::{JobInput, ResourceLimits, ServiceInput, WorkloadInput, validate_project_id};
pub use model::{
    Deployment, DeploymentStatus, DeploymentType, Endpoint, Job, Protocol, ResourceAction, Service,
};
pub use traits::DeploymentManager;
