//! Error types for the deployment manager.
//!
//! [`Error`] is the fixed taxonomy every lifecycle operation surfaces to its
//! caller. Runtime-specific failures ([`RuntimeError`](crate::runtime::RuntimeError))
//! are converted exactly once, at the operation boundary, by
//! [`crate::translate`].
//!
//! | Variant          | Meaning                                          | HTTP equivalent |
//! |------------------|--------------------------------------------------|-----------------|
//! | `NotFound`       | no container for the id in project/type scope    | 404             |
//! | `InvalidRequest` | bad input, or backend rejected a service deploy  | 400             |
//! | `BackendFailure` | unclassified runtime failure                     | 500             |
//! | `Config`         | manager configuration is invalid                 | 500             |
//!
//! Service listing never returns an error: a failed runtime query degrades to
//! an empty list (see [`DeploymentManager::list_services`](crate::DeploymentManager::list_services)).

use crate::deployment::DeploymentType;

/// Result type alias for deployment manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the deployment manager.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested deployment id has no matching container.
    #[error("{kind} '{id}' not found in project '{project_id}'")]
    NotFound {
        kind: DeploymentType,
        project_id: String,
        id: String,
    },

    /// Input was malformed, or the backend rejected a service deploy.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected runtime-level failure.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// Manager configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Creates a not-found error for a deployment.
    pub fn not_found(
        kind: DeploymentType,
        project_id: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind,
            project_id: project_id.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Creates a backend-failure error.
    pub fn backend_failure(message: impl Into<String>) -> Self {
        Self::BackendFailure(message.into())
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`Error::InvalidRequest`].
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Returns true for [`Error::BackendFailure`].
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendFailure(_))
    }

    /// HTTP status code an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidRequest(_) => 400,
            Self::BackendFailure(_) | Self::Config(_) => 500,
        }
    }
}
