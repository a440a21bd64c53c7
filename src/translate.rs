//! # Error Translator
//!
//! Maps [`RuntimeError`] into the fixed [`Error`] taxonomy. Each lifecycle
//! operation names itself with an [`Operation`] and translates exactly once,
//! at its boundary.
//!
//! | Operation                      | `ContainerNotFound` | anything else    |
//! |--------------------------------|---------------------|------------------|
//! | `DeployService`                | `InvalidRequest`    | `InvalidRequest` |
//! | `DeployJob`                    | `BackendFailure`    | `BackendFailure` |
//! | `Lookup` / `Delete` / `Logs`   | `NotFound`          | `BackendFailure` |
//! | `ListJobs` / `ListActions`     | `BackendFailure`    | `BackendFailure` |
//! | `EnsureNetwork`                | `BackendFailure`    | `BackendFailure` |
//!
//! `ListServices` has no error mapping: it degrades to an empty list via
//! [`degrade`].

use crate::deployment::DeploymentType;
use crate::error::Error;
use crate::runtime::RuntimeError;
use tracing::{error, warn};

/// The lifecycle operation a runtime failure happened in.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// Listing services (fail-open).
    ListServices { project_id: &'a str },
    /// Listing jobs.
    ListJobs { project_id: &'a str },
    /// Enumerating deploy actions.
    ListActions { kind: DeploymentType, project_id: &'a str },
    /// Provisioning the project network for a deploy.
    EnsureNetwork { project_id: &'a str },
    /// Creating/starting a service container.
    DeployService { display_name: &'a str },
    /// Creating/starting a job container.
    DeployJob { display_name: &'a str },
    /// Locating one deployment (metadata).
    Lookup { kind: DeploymentType, project_id: &'a str, id: &'a str },
    /// Removing one deployment.
    Delete { kind: DeploymentType, project_id: &'a str, id: &'a str },
    /// Fetching logs of one deployment.
    Logs { kind: DeploymentType, project_id: &'a str, id: &'a str },
}

impl<'a> Operation<'a> {
    /// Deploy operation for the given kind.
    pub fn deploy(kind: DeploymentType, display_name: &'a str) -> Self {
        match kind {
            DeploymentType::Service => Self::DeployService { display_name },
            DeploymentType::Job => Self::DeployJob { display_name },
        }
    }

    /// Translates a runtime failure raised inside this operation.
    pub fn translate(&self, err: RuntimeError) -> Error {
        let translated = match *self {
            Self::DeployService { display_name } => {
                Error::InvalidRequest(format!("could not deploy service '{display_name}': {err}"))
            }
            Self::DeployJob { display_name } => {
                Error::BackendFailure(format!("could not deploy job '{display_name}': {err}"))
            }
            Self::Lookup { kind, project_id, id }
            | Self::Delete { kind, project_id, id }
            | Self::Logs { kind, project_id, id }
                if err.is_container_not_found() =>
            {
                Error::not_found(kind, project_id, id)
            }
            Self::Lookup { kind, id, .. } => {
                Error::BackendFailure(format!("could not look up {kind} '{id}': {err}"))
            }
            Self::Delete { kind, id, .. } => {
                Error::BackendFailure(format!("could not delete {kind} '{id}': {err}"))
            }
            Self::Logs { kind, id, .. } => {
                Error::BackendFailure(format!("could not read logs of {kind} '{id}': {err}"))
            }
            Self::ListServices { project_id } => Error::BackendFailure(format!(
                "could not list services of project '{project_id}': {err}"
            )),
            Self::ListJobs { project_id } => Error::BackendFailure(format!(
                "could not list jobs of project '{project_id}': {err}"
            )),
            Self::ListActions { kind, project_id } => Error::BackendFailure(format!(
                "could not compute {kind} deploy actions in project '{project_id}': {err}"
            )),
            Self::EnsureNetwork { project_id } => Error::BackendFailure(format!(
                "could not provision network for project '{project_id}': {err}"
            )),
        };

        if translated.is_backend_failure() {
            error!(operation = ?self, error = %translated, "runtime operation failed");
        } else {
            warn!(operation = ?self, error = %translated, "runtime operation rejected");
        }
        translated
    }
}

/// Swallows a listing failure, returning an empty result.
///
/// Used only by service listing; callers must not read an empty list as
/// proof that nothing is deployed.
pub fn degrade<T>(op: Operation<'_>, err: RuntimeError) -> Vec<T> {
    warn!(operation = ?op, error = %err, "listing failed, returning empty result");
    Vec::new()
}
