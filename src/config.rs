//! Manager configuration.
//!
//! Loaded from TOML or from `WORKLOAD_DEPLOY_*` environment variables:
//!
//! ```toml
//! namespace = "workload"
//!
//! [backend]
//! kind = "docker"
//! binary = "/usr/bin/docker"
//! host = "unix:///var/run/docker.sock"
//! ```
//!
//! | Variable                        | Field            |
//! |---------------------------------|------------------|
//! | `WORKLOAD_DEPLOY_NAMESPACE`     | `namespace`      |
//! | `WORKLOAD_DEPLOY_BACKEND`       | `backend.kind`   |
//! | `WORKLOAD_DEPLOY_DOCKER_BINARY` | `backend.binary` |
//! | `WORKLOAD_DEPLOY_DOCKER_HOST`   | `backend.host`   |

use crate::constants::{DEFAULT_NAMESPACE, validate_namespace};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Prefix of the environment variables read by [`ManagerConfig::from_env`].
pub const ENV_PREFIX: &str = "WORKLOAD_DEPLOY_";

/// Top-level manager configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManagerConfig {
    /// Prefix for container, network and volume names.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Container runtime backend.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Container runtime backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Docker daemon, driven through the CLI.
    Docker {
        #[serde(default = "default_docker_binary")]
        binary: String,
        /// Daemon address passed as `--host` (default: CLI's own resolution).
        #[serde(default)]
        host: Option<String>,
    },
    /// In-process runtime with no persistence.
    Memory,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Docker {
            binary: default_docker_binary(),
            host: None,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            backend: BackendConfig::default(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

impl ManagerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Builds the configuration from `(name, value)` pairs; unrelated names
    /// are ignored and missing ones keep their defaults.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut namespace = None;
        let mut kind = None;
        let mut binary = None;
        let mut host = None;

        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "NAMESPACE" => namespace = Some(value),
                "BACKEND" => kind = Some(value.to_ascii_lowercase()),
                "DOCKER_BINARY" => binary = Some(value),
                "DOCKER_HOST" => host = Some(value).filter(|h| !h.is_empty()),
                _ => {}
            }
        }

        let backend = match kind.as_deref() {
            None | Some("docker") => BackendConfig::Docker {
                binary: binary.unwrap_or_else(default_docker_binary),
                host,
            },
            Some("memory") => BackendConfig::Memory,
            Some(other) => {
                return Err(Error::Config(format!(
                    "unknown backend '{other}' in {ENV_PREFIX}BACKEND (expected 'docker' or 'memory')"
                )));
            }
        };

        let config = Self {
            namespace: namespace.unwrap_or_else(default_namespace),
            backend,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        validate_namespace(&self.namespace)
            .map_err(|reason| Error::Config(format!("namespace '{}': {reason}", self.namespace)))?;

        if let BackendConfig::Docker { binary, .. } = &self.backend {
            if binary.trim().is_empty() {
                return Err(Error::Config("docker binary cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}
