//! Workload descriptors.
//!
//! [`WorkloadInput`] is the declarative description a caller hands to a
//! deploy call. It exists only for the duration of that call; everything that
//! must survive is encoded into container labels by [`crate::labels`].

use super::Endpoint;
use crate::constants::{
    IMAGE_REF_VALID_CHARS, MAX_CPUS, MAX_DEPLOYMENT_ID_LEN, MAX_DISPLAY_NAME_LEN, MAX_ENDPOINTS,
    MAX_ENV_VALUE_LEN, MAX_ENV_VARS, MAX_IMAGE_REF_LEN, MAX_LABEL_VALUE_LEN, MAX_MEMORY_MB,
    MAX_METADATA_ENTRIES, MAX_PROJECT_ID_LEN, MIN_MEMORY_MB, only_chars,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource limits applied by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU limit in cores (fractions allowed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    /// Memory limit in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
}

/// Declarative workload descriptor for a Service or a Job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadInput {
    /// Display name. The deployment id is derived from it.
    pub display_name: String,
    /// Image reference (e.g., "nginx:1.25", "ghcr.io/user/app:v1").
    pub image: String,
    /// Command and arguments; empty keeps the image default.
    #[serde(default)]
    pub command: Vec<String>,
    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Resource limits.
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Endpoints exposed on the project network.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Mount path for a persistent volume, if the workload needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_path: Option<String>,
    /// Arbitrary metadata, echoed back on the deployed workload.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Descriptor for a Service deploy.
pub type ServiceInput = WorkloadInput;

/// Descriptor for a Job deploy.
pub type JobInput = WorkloadInput;

impl WorkloadInput {
    /// Creates a descriptor with only the required fields.
    pub fn new(display_name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            image: image.into(),
            command: Vec::new(),
            env: BTreeMap::new(),
            resources: ResourceLimits::default(),
            endpoints: Vec::new(),
            description: None,
            volume_path: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_resources(mut self, cpus: Option<f64>, memory_mb: Option<u64>) -> Self {
        self.resources = ResourceLimits { cpus, memory_mb };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_volume(mut self, path: impl Into<String>) -> Self {
        self.volume_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Derives the deployment id from the display name.
    ///
    /// Lowercases, replaces runs of non-alphanumeric characters with a single
    /// `-`, trims dashes and truncates to [`MAX_DEPLOYMENT_ID_LEN`]. The
    /// mapping is deterministic, so redeploying the same display name targets
    /// the same identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the name has no alphanumeric character.
    pub fn deployment_id(&self) -> Result<String> {
        let id = slugify(&self.display_name);
        if id.is_empty() {
            return Err(Error::invalid_request(format!(
                "display name '{}' must contain at least one alphanumeric character",
                self.display_name
            )));
        }
        Ok(id)
    }

    /// Validates the descriptor before any backend call.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(Error::invalid_request("display name cannot be empty"));
        }
        if self.display_name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(Error::invalid_request(format!(
                "display name exceeds maximum length of {MAX_DISPLAY_NAME_LEN}"
            )));
        }
        self.deployment_id()?;

        validate_image_ref(&self.image)?;

        if self.env.len() > MAX_ENV_VARS {
            return Err(Error::invalid_request(format!(
                "too many environment variables: {} (max {MAX_ENV_VARS})",
                self.env.len()
            )));
        }
        for (key, value) in &self.env {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(Error::invalid_request(format!(
                    "invalid environment variable name '{key}'"
                )));
            }
            if value.len() > MAX_ENV_VALUE_LEN {
                return Err(Error::invalid_request(format!(
                    "environment variable {key} exceeds limit of {MAX_ENV_VALUE_LEN} bytes"
                )));
            }
        }

        if self.endpoints.len() > MAX_ENDPOINTS {
            return Err(Error::invalid_request(format!(
                "too many endpoints: {} (max {MAX_ENDPOINTS})",
                self.endpoints.len()
            )));
        }

        if let Some(cpus) = self.resources.cpus {
            if !(cpus > 0.0 && cpus <= MAX_CPUS) {
                return Err(Error::invalid_request(format!(
                    "cpu limit {cpus} must be in (0, {MAX_CPUS}]"
                )));
            }
        }
        if let Some(memory) = self.resources.memory_mb {
            if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&memory) {
                return Err(Error::invalid_request(format!(
                    "memory limit {memory} MiB must be between {MIN_MEMORY_MB} and {MAX_MEMORY_MB}"
                )));
            }
        }

        if let Some(path) = &self.volume_path {
            if !path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
                return Err(Error::invalid_request(format!(
                    "volume path '{path}' must be an absolute path without '..'"
                )));
            }
        }

        if let Some(description) = &self.description {
            if description.len() > MAX_LABEL_VALUE_LEN {
                return Err(Error::invalid_request(format!(
                    "description exceeds maximum length of {MAX_LABEL_VALUE_LEN}"
                )));
            }
        }

        if self.metadata.len() > MAX_METADATA_ENTRIES {
            return Err(Error::invalid_request(format!(
                "too many metadata entries: {} (max {MAX_METADATA_ENTRIES})",
                self.metadata.len()
            )));
        }
        for (key, value) in &self.metadata {
            let valid_key = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if !valid_key {
                return Err(Error::invalid_request(format!(
                    "metadata key '{key}' must be non-empty and contain only alphanumerics, '-', '_' or '.'"
                )));
            }
            if value.len() > MAX_LABEL_VALUE_LEN {
                return Err(Error::invalid_request(format!(
                    "metadata value for '{key}' exceeds maximum length of {MAX_LABEL_VALUE_LEN}"
                )));
            }
        }

        Ok(())
    }
}

/// Validates a project id before it is written into labels or names.
pub fn validate_project_id(project_id: &str) -> Result<()> {
    if project_id.is_empty() {
        return Err(Error::invalid_request("project id cannot be empty"));
    }
    if project_id.len() > MAX_PROJECT_ID_LEN {
        return Err(Error::invalid_request(format!(
            "project id exceeds maximum length of {MAX_PROJECT_ID_LEN}"
        )));
    }
    if project_id.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_request("project id contains control characters"));
    }
    Ok(())
}

fn validate_image_ref(image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(Error::invalid_request("image reference cannot be empty"));
    }
    if image.len() > MAX_IMAGE_REF_LEN {
        return Err(Error::invalid_request(format!(
            "image reference exceeds maximum length of {MAX_IMAGE_REF_LEN}"
        )));
    }
    if !only_chars(image, IMAGE_REF_VALID_CHARS) {
        return Err(Error::invalid_request(format!(
            "image reference '{image}' contains invalid characters"
        )));
    }
    Ok(())
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_DEPLOYMENT_ID_LEN {
        slug.truncate(MAX_DEPLOYMENT_ID_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}
