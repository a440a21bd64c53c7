//! # Action Enumerator
//!
//! Computes, without touching the runtime, the side effects a deploy call
//! would trigger. The manager gathers the read-only facts (existing
//! containers with the same identity, whether the project network exists)
//! and this module turns them into [`ResourceAction`]s.
//!
//! | Situation                         | Action id  | Deploy with it does            |
//! |-----------------------------------|------------|--------------------------------|
//! | identity free                     | `deploy`   | create + start                 |
//! | container with same identity      | `replace`  | remove existing, create, start |
//!
//! Deploying onto a taken identity without `replace` is left to the
//! runtime's name uniqueness and fails.

use crate::deployment::{DeploymentType, ResourceAction};
use crate::error::{Error, Result};
use crate::runtime::{ContainerInfo, ContainerSpec};

/// Action id for a plain deploy.
pub const DEPLOY_ACTION_ID: &str = "deploy";

/// Action id for replacing an existing deployment with the same identity.
pub const REPLACE_ACTION_ID: &str = "replace";

/// Deploy behavior selected by an action id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Deploy,
    Replace,
}

impl DeployAction {
    /// Parses the optional `action_id` of a deploy call.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for ids this manager never hands out.
    pub fn from_action_id(action_id: Option<&str>) -> Result<Self> {
        match action_id {
            None | Some(DEPLOY_ACTION_ID) => Ok(Self::Deploy),
            Some(REPLACE_ACTION_ID) => Ok(Self::Replace),
            Some(other) => Err(Error::invalid_request(format!(
                "unknown deploy action '{other}' (expected '{DEPLOY_ACTION_ID}' or '{REPLACE_ACTION_ID}')"
            ))),
        }
    }
}

/// Lists the actions a deploy of `spec` would take.
///
/// # Arguments
///
/// * `kind` - Service or Job
/// * `display_name` - Display name from the descriptor
/// * `spec` - Spec the deploy would create
/// * `existing` - Containers already holding the same identity
/// * `network_exists` - Whether the project network is already provisioned
pub fn plan(
    kind: DeploymentType,
    display_name: &str,
    spec: &ContainerSpec,
    existing: &[ContainerInfo],
    network_exists: bool,
) -> Vec<ResourceAction> {
    let network_note = if network_exists {
        String::new()
    } else {
        format!(" (creates project network {})", spec.network)
    };

    if existing.is_empty() {
        return vec![ResourceAction {
            action_id: DEPLOY_ACTION_ID.to_string(),
            description: format!(
                "Deploy {kind} '{display_name}' as container {} from image {}{network_note}",
                spec.name, spec.image
            ),
        }];
    }

    let replaced: Vec<&str> = existing.iter().map(|c| c.name.as_str()).collect();
    vec![ResourceAction {
        action_id: REPLACE_ACTION_ID.to_string(),
        description: format!(
            "Will replace existing container {} with {kind} '{display_name}' from image {}{network_note}",
            replaced.join(", "),
            spec.image
        ),
    }]
}
