//! # Container Spec Builder
//!
//! Pure transformation from a workload descriptor to a runtime-ready
//! [`ContainerSpec`]. No I/O happens here.
//!
//! ## Naming
//!
//! Runtime object names are deterministic so that identical inputs target
//! identical objects:
//!
//! | Object    | Name                                         |
//! |-----------|----------------------------------------------|
//! | network   | `{namespace}-{project}-{hash}`                      |
//! | container | `{namespace}-{project}-{type}-{deployment}-{hash}`  |
//! | volume    | `{container}-data`                                  |
//!
//! `{project}` is the project id itself when it is a valid name segment, or
//! `p` otherwise. It is for readability only. `{hash}` is a 12-character
//! SHA-256 prefix over the full identity (the project id for networks;
//! project id, type and deployment id for containers), so names stay
//! distinct even when readable segments line up, as with `acme` /
//! `service-web` and `acme-service` / `web`. Labels always carry the
//! verbatim project id; names are never decoded.
//!
//! ## Restart Policy
//!
//! | Type    | Policy       |
//! |---------|--------------|
//! | Service | `on-failure` |
//! | Job     | `no`         |

use crate::constants::{
    MAX_PROJECT_SEGMENT_LEN, NAME_HASH_LEN, NAME_SEGMENT_VALID_CHARS, VOLUME_SUFFIX,
    only_chars,
};
use crate::deployment::{DeploymentType, WorkloadInput};
use crate::error::Result;
use crate::labels::DeploymentLabels;
use crate::runtime::{ContainerSpec, RestartPolicy, VolumeMount};

/// Deterministic runtime object names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    namespace: String,
}

impl Naming {
    /// Creates naming rules for a (validated) namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Namespace prefixed to every runtime object name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the project's isolated network.
    pub fn project_network(&self, project_id: &str) -> String {
        format!(
            "{}-{}-{}",
            self.namespace,
            project_segment(project_id),
            identity_hash(&[project_id])
        )
    }

    /// Name of a deployment's container.
    pub fn container(
        &self,
        project_id: &str,
        deployment_type: DeploymentType,
        deployment_id: &str,
    ) -> String {
        let kind = deployment_type.as_str();
        format!(
            "{}-{}-{}-{}-{}",
            self.namespace,
            project_segment(project_id),
            kind,
            deployment_id,
            identity_hash(&[project_id, kind, deployment_id])
        )
    }

    /// Name of a container's data volume.
    pub fn volume(&self, container_name: &str) -> String {
        format!("{container_name}-{VOLUME_SUFFIX}")
    }
}

fn project_segment(project_id: &str) -> String {
    let usable = !project_id.is_empty()
        && project_id.len() <= MAX_PROJECT_SEGMENT_LEN
        && only_chars(project_id, NAME_SEGMENT_VALID_CHARS)
        && project_id.starts_with(|c: char| c.is_ascii_alphanumeric());

    if usable {
        project_id.to_string()
    } else {
        "p".to_string()
    }
}

/// Hex SHA-256 prefix over NUL-separated identity parts.
fn identity_hash(parts: &[&str]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    hex[..NAME_HASH_LEN].to_string()
}

/// Builds container specs for one namespace.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    naming: Naming,
}

impl SpecBuilder {
    /// Creates a builder using the given naming rules.
    pub fn new(naming: Naming) -> Self {
        Self { naming }
    }

    /// Naming rules shared with the network provisioner.
    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    /// Builds the container spec for a deployment.
    ///
    /// Labels and restart policy both derive from `deployment_type`, which
    /// the caller fixes (`deploy_service` / `deploy_job`).
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if no deployment id can be derived from the display
    /// name. Other validation is the caller's responsibility
    /// ([`WorkloadInput::validate`]).
    pub fn build(
        &self,
        project_id: &str,
        deployment_type: DeploymentType,
        input: &WorkloadInput,
    ) -> Result<ContainerSpec> {
        let identity = DeploymentLabels::from_input(project_id, deployment_type, input)?;
        let name = self
            .naming
            .container(project_id, deployment_type, &identity.deployment_id);

        let restart_policy = match deployment_type {
            DeploymentType::Service => RestartPolicy::OnFailure,
            DeploymentType::Job => RestartPolicy::Never,
        };

        let volume = input.volume_path.as_ref().map(|path| VolumeMount {
            name: self.naming.volume(&name),
            path: path.clone(),
        });

        let mut exposed_ports = input.endpoints.clone();
        exposed_ports.sort();
        exposed_ports.dedup();

        Ok(ContainerSpec {
            name,
            image: input.image.clone(),
            command: input.command.clone(),
            env: input.env.clone(),
            labels: identity.encode(),
            network: self.naming.project_network(project_id),
            restart_policy,
            cpus: input.resources.cpus,
            memory_mb: input.resources.memory_mb,
            exposed_ports,
            volume,
        })
    }
}
