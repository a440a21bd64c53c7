//! Deployment domain types.
//!
//! - `DeploymentType`: Service or Job
//! - `DeploymentStatus`: status derived from observed runtime state
//! - `Endpoint`: declared network endpoint (`port[/protocol]`)
//! - `Deployment`: the Service/Job domain object, always derived at query time
//! - `ResourceAction`: a side effect a deploy call would cause

use crate::runtime::ContainerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// =============================================================================
// Deployment Type
// =============================================================================

/// Kind of workload.
///
/// Determines the restart policy, the listing filter and the identity scope
/// used for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    /// Long-running workload, restarted on failure.
    Service,
    /// Run-to-completion workload, never restarted.
    Job,
}

impl DeploymentType {
    /// Wire value stored in labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Job => "job",
        }
    }

    /// Parses the wire value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "service" => Some(Self::Service),
            "job" => Some(Self::Job),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Deployment Status
// =============================================================================

/// Status derived from the container's live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Created, not yet started.
    Pending,
    /// Main process running.
    Running,
    /// Restarting after a failure (services only).
    Restarting,
    /// Paused by an operator.
    Paused,
    /// Service exited cleanly.
    Stopped,
    /// Job exited with code 0.
    Succeeded,
    /// Exited with a non-zero code, or the container is dead.
    Failed,
    /// State could not be determined.
    Unknown,
}

impl DeploymentStatus {
    /// Derives the status from the observed container state.
    ///
    /// A clean exit means `Succeeded` for a job but `Stopped` for a service,
    /// since a service is never expected to finish.
    pub fn derive(kind: DeploymentType, state: ContainerState, exit_code: Option<i32>) -> Self {
        match state {
            ContainerState::Created => Self::Pending,
            ContainerState::Running => Self::Running,
            ContainerState::Restarting => Self::Restarting,
            ContainerState::Paused => Self::Paused,
            ContainerState::Dead => Self::Failed,
            ContainerState::Unknown => Self::Unknown,
            ContainerState::Exited => match (kind, exit_code) {
                (_, Some(code)) if code != 0 => Self::Failed,
                (DeploymentType::Job, Some(_)) => Self::Succeeded,
                (DeploymentType::Job, None) => Self::Unknown,
                (DeploymentType::Service, _) => Self::Stopped,
            },
        }
    }

    /// Returns true if the workload has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Transport protocol of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Declared network endpoint, written as `port[/protocol]` (default `tcp`).
///
/// Serialized as its string form so that API payloads can keep using
/// `"8080"` or `"53/udp"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    /// Port inside the container (1-65535).
    pub port: u16,
    /// Protocol.
    pub protocol: Protocol,
}

impl Endpoint {
    /// TCP endpoint on `port`.
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }

    /// UDP endpoint on `port`.
    pub fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Udp,
        }
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (port, protocol) = match s.split_once('/') {
            Some((port, proto)) => {
                let protocol = match proto.to_ascii_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    other => return Err(format!("unsupported protocol '{other}' in endpoint '{s}'")),
                };
                (port, protocol)
            }
            None => (s, Protocol::Tcp),
        };

        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port in endpoint '{s}'"))?;
        if port == 0 {
            return Err(format!("port must be between 1 and 65535 in endpoint '{s}'"));
        }

        Ok(Self { port, protocol })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol.as_str())
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// A deployed Service or Job.
///
/// Never stored: every instance is decoded from a container's labels plus
/// the state the runtime reports at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment id, unique per project and type.
    pub deployment_id: String,
    /// Owning project.
    pub project_id: String,
    /// Service or Job.
    pub deployment_type: DeploymentType,
    /// Display name supplied at deploy time.
    pub display_name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image the container runs.
    pub image: String,
    /// Derived status.
    pub status: DeploymentStatus,
    /// Exit code of the main process, once exited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Container creation time.
    pub created_at: DateTime<Utc>,
    /// Declared endpoints.
    pub endpoints: Vec<Endpoint>,
    /// Caller supplied metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Runtime container id.
    pub container_id: String,
}

/// A long-running workload.
pub type Service = Deployment;

/// A run-to-completion workload.
pub type Job = Deployment;

// =============================================================================
// Resource Action
// =============================================================================

/// A side effect a deploy call would cause, computed without mutating state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAction {
    /// Id to pass back as `action_id` to the deploy call.
    pub action_id: String,
    /// Human readable description.
    pub description: String,
}
