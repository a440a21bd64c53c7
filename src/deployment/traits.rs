//! Deployment Manager trait definition.
//!
//! This is the contract the API layer calls into with already-validated,
//! already-authorized input. Every operation is scoped by project id and by
//! deployment type.

use super::{Job, JobInput, ResourceAction, Service, ServiceInput};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Translates workload descriptors into container-runtime operations.
///
/// # Error Taxonomy
///
/// | Operation                 | Backend failure surfaces as |
/// |---------------------------|-----------------------------|
/// | `list_services`           | empty list (never an error) |
/// | `list_jobs`               | `BackendFailure`            |
/// | `deploy_service`          | `InvalidRequest`            |
/// | `deploy_job`              | `BackendFailure`            |
/// | metadata / delete / logs  | `NotFound` or `BackendFailure` |
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; unrelated projects may be
/// operated on concurrently through one shared manager.
#[async_trait]
pub trait DeploymentManager: Send + Sync {
    // =========================================================================
    // Services
    // =========================================================================

    /// Lists the project's services.
    ///
    /// A failing runtime query yields an empty list, so an empty result is
    /// not proof that the project has no services.
    async fn list_services(&self, project_id: &str) -> Vec<Service>;

    /// Deploys a service (restart-on-failure).
    ///
    /// # Arguments
    ///
    /// * `project_id` - Owning project
    /// * `service` - Workload descriptor
    /// * `action_id` - One of the ids returned by
    ///   [`list_deploy_service_actions`](Self::list_deploy_service_actions),
    ///   or `None` for a plain deploy
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the descriptor is invalid or the runtime rejects it
    /// - `BackendFailure` if the project network cannot be provisioned
    async fn deploy_service(
        &self,
        project_id: &str,
        service: &ServiceInput,
        action_id: Option<&str>,
    ) -> Result<Service>;

    /// Computes what [`deploy_service`](Self::deploy_service) would do,
    /// without changing anything.
    async fn list_deploy_service_actions(
        &self,
        project_id: &str,
        service: &ServiceInput,
    ) -> Result<Vec<ResourceAction>>;

    /// Returns one service.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id has no service container in the project
    async fn get_service_metadata(&self, project_id: &str, service_id: &str) -> Result<Service>;

    /// Removes a service. Not idempotent: unknown ids fail with `NotFound`.
    ///
    /// Named volumes are kept unless `delete_volumes` is set.
    async fn delete_service(
        &self,
        project_id: &str,
        service_id: &str,
        delete_volumes: bool,
    ) -> Result<()>;

    /// Returns the service's log text.
    ///
    /// `lines` keeps the last N lines; `since` keeps lines emitted at or
    /// after the timestamp. Both are optional and combine.
    async fn get_service_logs(
        &self,
        project_id: &str,
        service_id: &str,
        lines: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String>;

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Lists the project's jobs.
    ///
    /// # Errors
    ///
    /// - `BackendFailure` if the runtime query fails
    async fn list_jobs(&self, project_id: &str) -> Result<Vec<Job>>;

    /// Deploys a job (run once, never restarted).
    ///
    /// A job whose container cannot be created or started leaves nothing
    /// behind in the project.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the descriptor is invalid
    /// - `BackendFailure` if the runtime rejects the job
    async fn deploy_job(
        &self,
        project_id: &str,
        job: &JobInput,
        action_id: Option<&str>,
    ) -> Result<Job>;

    /// Computes what [`deploy_job`](Self::deploy_job) would do.
    async fn list_deploy_job_actions(
        &self,
        project_id: &str,
        job: &JobInput,
    ) -> Result<Vec<ResourceAction>>;

    /// Returns one job.
    async fn get_job_metadata(&self, project_id: &str, job_id: &str) -> Result<Job>;

    /// Removes a job. Named volumes are always kept.
    async fn delete_job(&self, project_id: &str, job_id: &str) -> Result<()>;

    /// Returns the job's log text. Same bounds as
    /// [`get_service_logs`](Self::get_service_logs).
    async fn get_job_logs(
        &self,
        project_id: &str,
        job_id: &str,
        lines: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String>;
}
