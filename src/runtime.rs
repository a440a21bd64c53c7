//! Container runtime contract.
//!
//! This trait is everything the deployment manager needs from a container
//! backend:
//! - containers: `create` → `start` → `inspect` / `list` → `remove`
//! - logs: timestamped lines, materialized (not streamed)
//! - networks: `inspect` / `create` (never delete)
//!
//! # Labels Are the Schema
//!
//! A backend stores no platform metadata of its own. Everything the manager
//! knows about a container (project, deployment id, kind) is read back from
//! the labels it attached at creation time, so implementations **MUST**
//! preserve label keys and values verbatim and support exact-match label
//! selectors in [`ContainerRuntime::list_containers`].
//!
//! # Implementations
//!
//! - `DockerRuntime`: drives the Docker CLI
//! - `MemoryRuntime`: in-process state, deterministic (tests, dry runs)

use crate::deployment::Endpoint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat key/value tag set attached to containers and networks.
pub type Labels = BTreeMap<String, String>;

/// Result type alias for runtime backend operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

// =============================================================================
// Runtime Errors
// =============================================================================

/// Backend-level failures.
///
/// These never reach callers of the deployment manager directly; they are
/// translated into [`crate::Error`] at each operation boundary.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Container not found.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Network not found.
    #[error("network not found: {0}")]
    NetworkNotFound(String),

    /// An object with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The backend rejected the request (bad reference, invalid option).
    #[error("rejected by runtime: {0}")]
    Rejected(String),

    /// Image could not be found or pulled.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// The runtime cannot be reached.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// A runtime command exited unsuccessfully for an unclassified reason.
    #[error("runtime command '{command}' failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A runtime command did not finish in time.
    #[error("runtime command '{command}' timed out after {duration:?}")]
    Timeout {
        command: String,
        duration: std::time::Duration,
    },

    /// A runtime command produced more output than can be captured.
    #[error("output of runtime command '{command}' exceeds {limit} bytes")]
    OutputTooLarge { command: String, limit: usize },

    /// Runtime output could not be parsed.
    #[error("failed to parse runtime output: {0}")]
    Parse(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Returns true if the error reports a name collision.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Returns true if the error reports a missing container.
    pub fn is_container_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_))
    }
}

// =============================================================================
// Container Specification
// =============================================================================

/// Restart policy applied by the runtime when the main process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Run exactly once; the exit code is the final status.
    Never,
    /// Restart when the process exits with a non-zero code.
    OnFailure,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Never => write!(f, "no"),
            Self::OnFailure => write!(f, "on-failure"),
        }
    }
}

/// Named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Runtime volume name.
    pub name: String,
    /// Absolute mount path inside the container.
    pub path: String,
}

/// Runtime-ready container specification.
///
/// Produced by [`crate::builder::SpecBuilder`]; consumed by
/// [`ContainerRuntime::create_container`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name, unique per runtime.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Command and arguments (empty = image default).
    pub command: Vec<String>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Labels encoding platform identity.
    pub labels: Labels,
    /// Network the container joins.
    pub network: String,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// CPU limit in cores.
    pub cpus: Option<f64>,
    /// Memory limit in MiB.
    pub memory_mb: Option<u64>,
    /// Ports exposed on the project network.
    pub exposed_ports: Vec<Endpoint>,
    /// Optional persistent volume.
    pub volume: Option<VolumeMount>,
}

// =============================================================================
// Observed State
// =============================================================================

/// Container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Main process is running.
    Running,
    /// Restarting after a failure.
    Restarting,
    /// Paused.
    Paused,
    /// Main process exited.
    Exited,
    /// Being removed, or removal failed.
    Dead,
    /// State string not recognized.
    Unknown,
}

impl ContainerState {
    /// Parses a runtime state string (`running`, `exited`, ...).
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "restarting" => Self::Restarting,
            "paused" => Self::Paused,
            "exited" => Self::Exited,
            "dead" | "removing" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Snapshot of a container as observed at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Runtime container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// Labels attached at creation.
    pub labels: Labels,
    /// Current state.
    pub state: ContainerState,
    /// Exit code of the main process, once it has exited.
    pub exit_code: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Named volumes mounted into the container.
    pub volumes: Vec<String>,
}

/// Network as observed at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Runtime network id.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Labels attached at creation.
    pub labels: Labels,
}

/// A single timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// When the line was emitted.
    pub timestamp: DateTime<Utc>,
    /// Line content without the trailing newline.
    pub text: String,
}

impl LogLine {
    /// Creates a log line.
    pub fn new(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// Hints a backend may use to narrow log retrieval.
///
/// Backends may return more than requested; the manager applies the exact
/// bounds afterwards (see [`crate::logs`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Keep at most this many trailing lines.
    pub tail: Option<usize>,
    /// Keep lines at or after this timestamp.
    pub since: Option<DateTime<Utc>>,
}

// =============================================================================
// Container Runtime Trait
// =============================================================================

/// Container runtime backend.
///
/// One implementation per backend; the manager only ever sees
/// `Arc<dyn ContainerRuntime>`. Implementations must be `Send + Sync` and
/// must not retry: each call is a single attempt whose failure propagates.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Returns the backend name.
    fn name(&self) -> &str;

    /// Creates (but does not start) a container.
    ///
    /// # Returns
    ///
    /// The runtime container id.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::AlreadyExists`] if `spec.name` is taken
    /// - [`RuntimeError::ImageNotFound`] / [`RuntimeError::Rejected`] for bad images
    /// - [`RuntimeError::NetworkNotFound`] if `spec.network` does not exist
    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<String>;

    /// Starts a created container.
    async fn start_container(&self, id: &str) -> RuntimeResult<()>;

    /// Returns the current state of one container.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ContainerNotFound`] if no such container exists
    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo>;

    /// Lists containers (running or not) whose labels contain every entry
    /// of `selector`.
    async fn list_containers(&self, selector: &Labels) -> RuntimeResult<Vec<ContainerInfo>>;

    /// Force-removes a container, and its named volumes if `remove_volumes`.
    async fn remove_container(&self, id: &str, remove_volumes: bool) -> RuntimeResult<()>;

    /// Returns the container's log lines in emission order.
    async fn container_logs(&self, id: &str, query: &LogQuery) -> RuntimeResult<Vec<LogLine>>;

    /// Looks up a network by name. `Ok(None)` if absent.
    async fn inspect_network(&self, name: &str) -> RuntimeResult<Option<NetworkInfo>>;

    /// Creates an isolated network.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::AlreadyExists`] if a network with `name` exists
    async fn create_network(&self, name: &str, labels: &Labels) -> RuntimeResult<NetworkInfo>;

    /// Releases the backend connection. Called once, on manager shutdown.
    async fn shutdown(&self) -> RuntimeResult<()> {
        Ok(())
    }
}

/// Returns true if `labels` contains every entry of `selector`.
pub fn matches_selector(labels: &Labels, selector: &Labels) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}
