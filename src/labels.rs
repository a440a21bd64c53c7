//! # Label Codec
//!
//! Bidirectional mapping between platform identity and the flat label set
//! attached to every managed container.
//!
//! ```text
//!   (project, type, input) ──encode──▶ Labels ──decode──▶ DeploymentLabels
//!                                         │
//!                      ContainerInfo ─────┴──to_deployment──▶ Deployment
//! ```
//!
//! ## Contract
//!
//! `DeploymentLabels::decode(&labels.encode()) == Ok(labels)` for every
//! field carried in labels. Project id, deployment id and deployment type
//! must always be recoverable; a container lacking any required key is not a
//! managed deployment and is rejected with [`LabelError`].
//!
//! Key names live in [`crate::constants`]; see that module before renaming.

use crate::constants::{
    LABEL_DEPLOYMENT_ID, LABEL_DEPLOYMENT_TYPE, LABEL_DESCRIPTION, LABEL_DISPLAY_NAME,
    LABEL_ENDPOINTS, LABEL_MANAGED, LABEL_METADATA_PREFIX, LABEL_PROJECT_ID, MANAGED_LABEL_VALUE,
};
use crate::deployment::{Deployment, DeploymentStatus, DeploymentType, Endpoint, WorkloadInput};
use crate::error::Result;
use crate::runtime::{ContainerInfo, Labels};
use std::collections::BTreeMap;

/// Errors decoding a label set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// A required key is absent.
    #[error("missing required label '{0}'")]
    Missing(&'static str),

    /// A key is present but its value cannot be decoded.
    #[error("invalid value '{value}' for label '{key}'")]
    Invalid { key: &'static str, value: String },
}

/// Platform identity carried in a container's labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLabels {
    pub project_id: String,
    pub deployment_id: String,
    pub deployment_type: DeploymentType,
    pub display_name: String,
    pub description: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub metadata: BTreeMap<String, String>,
}

impl DeploymentLabels {
    /// Collects the label-carried fields of a workload descriptor.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if no deployment id can be derived from the name.
    pub fn from_input(
        project_id: &str,
        deployment_type: DeploymentType,
        input: &WorkloadInput,
    ) -> Result<Self> {
        Ok(Self {
            project_id: project_id.to_string(),
            deployment_id: input.deployment_id()?,
            deployment_type,
            display_name: input.display_name.clone(),
            description: input.description.clone(),
            endpoints: input.endpoints.clone(),
            metadata: input.metadata.clone(),
        })
    }

    /// Encodes into a label set.
    pub fn encode(&self) -> Labels {
        let mut labels = identity_selector(
            &self.project_id,
            self.deployment_type,
            &self.deployment_id,
        );
        labels.insert(LABEL_DISPLAY_NAME.to_string(), self.display_name.clone());

        if let Some(description) = &self.description {
            labels.insert(LABEL_DESCRIPTION.to_string(), description.clone());
        }
        if !self.endpoints.is_empty() {
            let endpoints: Vec<String> = self.endpoints.iter().map(ToString::to_string).collect();
            labels.insert(LABEL_ENDPOINTS.to_string(), endpoints.join(","));
        }
        for (key, value) in &self.metadata {
            labels.insert(format!("{LABEL_METADATA_PREFIX}{key}"), value.clone());
        }
        labels
    }

    /// Decodes a label set. Unrelated labels are ignored.
    pub fn decode(labels: &Labels) -> std::result::Result<Self, LabelError> {
        let required = |key: &'static str| -> std::result::Result<String, LabelError> {
            match labels.get(key) {
                Some(value) if !value.is_empty() => Ok(value.clone()),
                _ => Err(LabelError::Missing(key)),
            }
        };

        let raw_type = required(LABEL_DEPLOYMENT_TYPE)?;
        let deployment_type =
            DeploymentType::parse(&raw_type).ok_or_else(|| LabelError::Invalid {
                key: LABEL_DEPLOYMENT_TYPE,
                value: raw_type.clone(),
            })?;

        let endpoints = match labels.get(LABEL_ENDPOINTS) {
            Some(raw) if !raw.is_empty() => raw
                .split(',')
                .map(|e| {
                    e.parse::<Endpoint>().map_err(|_| LabelError::Invalid {
                        key: LABEL_ENDPOINTS,
                        value: raw.clone(),
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        let metadata = labels
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(LABEL_METADATA_PREFIX)
                    .filter(|key| !key.is_empty())
                    .map(|key| (key.to_string(), v.clone()))
            })
            .collect();

        Ok(Self {
            project_id: required(LABEL_PROJECT_ID)?,
            deployment_id: required(LABEL_DEPLOYMENT_ID)?,
            deployment_type,
            display_name: required(LABEL_DISPLAY_NAME)?,
            description: labels.get(LABEL_DESCRIPTION).cloned(),
            endpoints,
            metadata,
        })
    }
}

// =============================================================================
// Selectors
// =============================================================================

/// Selector matching every managed container of one type in a project.
pub fn project_selector(project_id: &str, deployment_type: DeploymentType) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_MANAGED.to_string(), MANAGED_LABEL_VALUE.to_string());
    labels.insert(LABEL_PROJECT_ID.to_string(), project_id.to_string());
    labels.insert(
        LABEL_DEPLOYMENT_TYPE.to_string(),
        deployment_type.as_str().to_string(),
    );
    labels
}

/// Selector matching exactly one deployment identity.
pub fn identity_selector(
    project_id: &str,
    deployment_type: DeploymentType,
    deployment_id: &str,
) -> Labels {
    let mut labels = project_selector(project_id, deployment_type);
    labels.insert(LABEL_DEPLOYMENT_ID.to_string(), deployment_id.to_string());
    labels
}

/// Labels attached to a project network.
pub fn network_labels(project_id: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_MANAGED.to_string(), MANAGED_LABEL_VALUE.to_string());
    labels.insert(LABEL_PROJECT_ID.to_string(), project_id.to_string());
    labels
}

// =============================================================================
// Domain Mapping
// =============================================================================

/// Decodes a container into a [`Deployment`], combining its labels with the
/// state the runtime observed.
pub fn to_deployment(info: &ContainerInfo) -> std::result::Result<Deployment, LabelError> {
    let labels = DeploymentLabels::decode(&info.labels)?;
    let status = DeploymentStatus::derive(labels.deployment_type, info.state, info.exit_code);

    Ok(Deployment {
        deployment_id: labels.deployment_id,
        project_id: labels.project_id,
        deployment_type: labels.deployment_type,
        display_name: labels.display_name,
        description: labels.description,
        image: info.image.clone(),
        status,
        exit_code: info.exit_code,
        created_at: info.created_at,
        endpoints: labels.endpoints,
        metadata: labels.metadata,
        container_id: info.id.clone(),
    })
}

/// Decodes every container that carries a valid label set; others are
/// skipped with a warning.
pub fn decode_all(containers: &[ContainerInfo]) -> Vec<Deployment> {
    containers
        .iter()
        .filter_map(|info| match to_deployment(info) {
            Ok(deployment) => Some(deployment),
            Err(e) => {
                tracing::warn!(container = %info.name, error = %e, "skipping undecodable container");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeploymentLabels {
        DeploymentLabels {
            project_id: "proj1".into(),
            deployment_id: "web".into(),
            deployment_type: DeploymentType::Service,
            display_name: "Web".into(),
            description: None,
            endpoints: vec![],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_encode_writes_required_keys() {
        let labels = sample().encode();
        assert_eq!(labels[LABEL_PROJECT_ID], "proj1");
        assert_eq!(labels[LABEL_DEPLOYMENT_ID], "web");
        assert_eq!(labels[LABEL_DEPLOYMENT_TYPE], "service");
        assert_eq!(labels[LABEL_DISPLAY_NAME], "Web");
        assert_eq!(labels[LABEL_MANAGED], MANAGED_LABEL_VALUE);
        assert!(!labels.contains_key(LABEL_ENDPOINTS));
        assert!(!labels.contains_key(LABEL_DESCRIPTION));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let mut labels = sample().encode();
        labels.insert(LABEL_DEPLOYMENT_TYPE.into(), "cronjob".into());
        assert_eq!(
            DeploymentLabels::decode(&labels),
            Err(LabelError::Invalid {
                key: LABEL_DEPLOYMENT_TYPE,
                value: "cronjob".into()
            })
        );
    }

    #[test]
    fn test_decode_treats_empty_required_value_as_missing() {
        let mut labels = sample().encode();
        labels.insert(LABEL_DEPLOYMENT_ID.into(), String::new());
        assert_eq!(
            DeploymentLabels::decode(&labels),
            Err(LabelError::Missing(LABEL_DEPLOYMENT_ID))
        );
    }

    #[test]
    fn test_identity_selector_extends_project_selector() {
        let project = project_selector("p", DeploymentType::Job);
        let identity = identity_selector("p", DeploymentType::Job, "batch");
        assert!(project.iter().all(|(k, v)| identity.get(k) == Some(v)));
        assert_eq!(identity.len(), project.len() + 1);
    }
}
