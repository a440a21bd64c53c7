//! # Deployment Manager Constants
//!
//! Label keys, naming rules and input limits shared by the label codec,
//! the container spec builder and the runtime backends. These constants are
//! the **single source of truth** for the wire contract with the container
//! runtime: any backend must store the label keys below verbatim.
//!
//! ## Cross-References
//!
//! - [`crate::labels`]: Encodes and decodes the label keys
//! - [`crate::builder`]: Uses naming rules and resource bounds
//! - [`crate::deployment`]: Uses input limits during validation

// =============================================================================
// Label Keys
// =============================================================================
//
// The runtime has no concept of project, deployment or workload kind. Every
// managed container carries these keys instead; they are the only channel for
// platform identity, so renaming one orphans every existing container.
// =============================================================================

/// Prefix shared by every label this crate writes.
pub const LABEL_PREFIX: &str = "workload.";

/// Marks a container or network as managed by this crate. Value is always
/// [`MANAGED_LABEL_VALUE`].
pub const LABEL_MANAGED: &str = "workload.managed";

/// Deployment type (`service` or `job`).
pub const LABEL_DEPLOYMENT_TYPE: &str = "workload.deployment.type";

/// Owning project id, stored verbatim.
pub const LABEL_PROJECT_ID: &str = "workload.project.id";

/// Deployment id, unique per project and deployment type.
pub const LABEL_DEPLOYMENT_ID: &str = "workload.deployment.id";

/// Human readable display name as supplied by the caller.
pub const LABEL_DISPLAY_NAME: &str = "workload.deployment.name";

/// Optional free-text description.
pub const LABEL_DESCRIPTION: &str = "workload.deployment.description";

/// Declared endpoints, comma separated (`8080/tcp,9090/udp`).
pub const LABEL_ENDPOINTS: &str = "workload.deployment.endpoints";

/// Prefix for caller supplied metadata (`workload.metadata.<key>`).
pub const LABEL_METADATA_PREFIX: &str = "workload.metadata.";

/// Value of [`LABEL_MANAGED`].
pub const MANAGED_LABEL_VALUE: &str = "true";

// =============================================================================
// Naming
// =============================================================================

/// Default namespace used as prefix for container, network and volume names.
pub const DEFAULT_NAMESPACE: &str = "workload";

/// Maximum namespace length.
pub const MAX_NAMESPACE_LEN: usize = 32;

/// Maximum length of a project id used verbatim inside runtime object names.
///
/// Longer ids (or ids with characters the runtime rejects in names) are
/// replaced by `p`. The label still carries the full id.
pub const MAX_PROJECT_SEGMENT_LEN: usize = 40;

/// Number of hex characters kept from the identity hash suffixing names.
pub const NAME_HASH_LEN: usize = 12;

/// Suffix appended to the container name to form its data volume name.
pub const VOLUME_SUFFIX: &str = "data";

/// Valid characters for namespaces and name segments.
///
/// Includes: `a-z`, `0-9`, `-`, `_`, `.`
pub const NAME_SEGMENT_VALID_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789-_.";

// =============================================================================
// Input Limits
// =============================================================================

/// Maximum display name length in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 128;

/// Maximum deployment id length (the slug derived from the display name).
pub const MAX_DEPLOYMENT_ID_LEN: usize = 63;

/// Maximum project id length accepted.
pub const MAX_PROJECT_ID_LEN: usize = 256;

/// Maximum OCI image reference length in bytes.
pub const MAX_IMAGE_REF_LEN: usize = 512;

/// Valid characters for image references.
///
/// The `@` is for digest references like `nginx@sha256:abc...`.
/// The `:` is for tag references like `nginx:latest`.
pub const IMAGE_REF_VALID_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_./:@";

/// Maximum number of environment variables per workload.
pub const MAX_ENV_VARS: usize = 256;

/// Maximum length of an environment variable value (32 KiB).
pub const MAX_ENV_VALUE_LEN: usize = 32 * 1024;

/// Maximum number of declared endpoints per workload.
pub const MAX_ENDPOINTS: usize = 32;

/// Maximum number of metadata entries per workload.
pub const MAX_METADATA_ENTRIES: usize = 64;

/// Maximum length of a label value written by the codec.
pub const MAX_LABEL_VALUE_LEN: usize = 4096;

/// Maximum CPU limit (cores).
pub const MAX_CPUS: f64 = 64.0;

/// Minimum memory limit accepted by container runtimes (MiB).
pub const MIN_MEMORY_MB: u64 = 6;

/// Maximum memory limit (64 GiB in MiB).
pub const MAX_MEMORY_MB: u64 = 64 * 1024;

// =============================================================================
// Runtime Commands
// =============================================================================

/// Timeout for a single runtime CLI invocation.
pub const RUNTIME_COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Timeout for the availability probe run at connect time.
pub const RUNTIME_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Maximum captured stdout/stderr per runtime command (16 MiB).
///
/// Larger output fails the command with `RuntimeError::OutputTooLarge`
/// rather than being cut.
pub const MAX_COMMAND_OUTPUT: usize = 16 * 1024 * 1024;

/// Containers inspected per `docker inspect` call when listing.
pub const INSPECT_BATCH_SIZE: usize = 64;

/// Maximum stderr echoed into an error message.
pub const MAX_ERROR_DETAIL_LEN: usize = 1024;

// =============================================================================
// Validation Helpers
// =============================================================================

/// Returns true if every character of `s` belongs to `allowed`.
#[inline]
pub(crate) fn only_chars(s: &str, allowed: &str) -> bool {
    s.chars().all(|c| allowed.contains(c))
}

/// Validates a namespace for use in runtime object names.
///
/// # Returns
///
/// `Ok(())` if valid, `Err(reason)` with a description of the failure.
#[must_use = "validation result must be checked"]
pub fn validate_namespace(namespace: &str) -> std::result::Result<(), &'static str> {
    if namespace.is_empty() {
        return Err("namespace cannot be empty");
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err("namespace exceeds maximum length");
    }
    if !only_chars(namespace, NAME_SEGMENT_VALID_CHARS) {
        return Err("namespace contains invalid characters");
    }
    if !namespace.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err("namespace must start with an alphanumeric character");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_keys_share_prefix() {
        for key in [
            LABEL_MANAGED,
            LABEL_DEPLOYMENT_TYPE,
            LABEL_PROJECT_ID,
            LABEL_DEPLOYMENT_ID,
            LABEL_DISPLAY_NAME,
            LABEL_DESCRIPTION,
            LABEL_ENDPOINTS,
            LABEL_METADATA_PREFIX,
        ] {
            assert!(key.starts_with(LABEL_PREFIX), "{key}");
        }
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace(DEFAULT_NAMESPACE).is_ok());
        assert!(validate_namespace("team-a.prod").is_ok());
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("-lead").is_err());
        assert!(validate_namespace("Upper").is_err());
        assert!(validate_namespace(&"a".repeat(MAX_NAMESPACE_LEN + 1)).is_err());
    }
}
