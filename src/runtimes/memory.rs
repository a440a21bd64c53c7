//! # In-Memory Runtime
//!
//! A [`ContainerRuntime`] that keeps containers, networks and volumes in
//! process memory. Nothing runs: a started container simply reports
//! `running` until [`MemoryRuntime::exit_container`] is called.
//!
//! Used as the `memory` backend and as the substrate of the test suite.
//! The `with_*` / `set_*` hooks inject the failures a real daemon produces
//! (missing images, failing starts, an unreachable daemon).
//!
//! ## Reference Validation
//!
//! Mirrors the daemon's parser closely enough for deploy-path tests: the
//! repository part of an image reference must be lowercase, and a reference
//! registered with [`MemoryRuntime::with_missing_image`] cannot be pulled.

use crate::constants::IMAGE_REF_VALID_CHARS;
use crate::runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, ContainerState, Labels, LogLine, LogQuery,
    NetworkInfo, RuntimeError, RuntimeResult, matches_selector,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug)]
struct MemoryContainer {
    info: ContainerInfo,
    logs: Vec<LogLine>,
}

#[derive(Debug, Default)]
struct State {
    /// Creation order is preserved.
    containers: Vec<MemoryContainer>,
    networks: BTreeMap<String, NetworkInfo>,
    volumes: BTreeSet<String>,
    missing_images: BTreeSet<String>,
    failing_start: BTreeSet<String>,
    unavailable: bool,
}

impl State {
    fn check_available(&self) -> RuntimeResult<()> {
        if self.unavailable {
            return Err(RuntimeError::Unavailable(
                "memory runtime marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves an id or a name.
    fn find(&self, id: &str) -> RuntimeResult<usize> {
        self.containers
            .iter()
            .position(|c| c.info.id == id || c.info.name == id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))
    }
}

/// In-process container runtime.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<State>,
}

impl MemoryRuntime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RuntimeResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::Internal(format!("lock poisoned: {e}")))
    }

    /// Makes `image` unpullable: creating a container from it fails with
    /// [`RuntimeError::ImageNotFound`].
    pub fn with_missing_image(self, image: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.missing_images.insert(image.into());
        }
        self
    }

    /// Makes containers from `image` fail to start.
    pub fn with_failing_start(self, image: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing_start.insert(image.into());
        }
        self
    }

    /// Marks every subsequent call as failing with
    /// [`RuntimeError::Unavailable`] (or clears the flag).
    pub fn set_unavailable(&self, unavailable: bool) -> RuntimeResult<()> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    /// Appends a log line to a container.
    pub fn append_log(&self, id: &str, timestamp: DateTime<Utc>, text: &str) -> RuntimeResult<()> {
        let mut state = self.lock()?;
        let idx = state.find(id)?;
        state.containers[idx].logs.push(LogLine::new(timestamp, text));
        Ok(())
    }

    /// Simulates the main process exiting with `code`.
    pub fn exit_container(&self, id: &str, code: i32) -> RuntimeResult<()> {
        let mut state = self.lock()?;
        let idx = state.find(id)?;
        let info = &mut state.containers[idx].info;
        info.state = ContainerState::Exited;
        info.exit_code = Some(code);
        Ok(())
    }

    /// Inserts a container as-is, bypassing validation. Lets tests plant
    /// containers with foreign or broken labels.
    pub fn insert_container(&self, info: ContainerInfo) -> RuntimeResult<()> {
        let mut state = self.lock()?;
        for volume in &info.volumes {
            state.volumes.insert(volume.clone());
        }
        state.containers.push(MemoryContainer {
            info,
            logs: Vec::new(),
        });
        Ok(())
    }

    /// Number of containers, in any state.
    pub fn container_count(&self) -> usize {
        self.state.lock().map(|s| s.containers.len()).unwrap_or(0)
    }

    /// Number of networks.
    pub fn network_count(&self) -> usize {
        self.state.lock().map(|s| s.networks.len()).unwrap_or(0)
    }

    /// Names of all volumes, sorted.
    pub fn volume_names(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.volumes.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn check_reference(image: &str) -> RuntimeResult<()> {
    let valid_chars = !image.is_empty() && image.chars().all(|c| IMAGE_REF_VALID_CHARS.contains(c));
    // Tag or digest may be mixed case; the repository may not.
    let repository = image
        .split('@')
        .next()
        .map(|r| match r.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => repo,
            _ => r,
        })
        .unwrap_or(image);

    if !valid_chars || repository.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(RuntimeError::Rejected(format!(
            "invalid reference format: repository name must be lowercase: {image}"
        )));
    }
    Ok(())
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<String> {
        let mut state = self.lock()?;
        state.check_available()?;

        check_reference(&spec.image)?;
        if state.missing_images.contains(&spec.image) {
            return Err(RuntimeError::ImageNotFound(spec.image.clone()));
        }
        if state.containers.iter().any(|c| c.info.name == spec.name) {
            return Err(RuntimeError::AlreadyExists(format!(
                "container name \"{}\" is already in use",
                spec.name
            )));
        }
        if !state.networks.contains_key(&spec.network) {
            return Err(RuntimeError::NetworkNotFound(spec.network.clone()));
        }

        let volumes: Vec<String> = spec.volume.iter().map(|v| v.name.clone()).collect();
        for volume in &volumes {
            state.volumes.insert(volume.clone());
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        state.containers.push(MemoryContainer {
            info: ContainerInfo {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                labels: spec.labels.clone(),
                state: ContainerState::Created,
                exit_code: None,
                created_at: Utc::now(),
                volumes,
            },
            logs: Vec::new(),
        });

        debug!(container = %spec.name, id = %id, "memory runtime created container");
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> RuntimeResult<()> {
        let mut state = self.lock()?;
        state.check_available()?;

        let idx = state.find(id)?;
        let image = state.containers[idx].info.image.clone();
        if state.failing_start.contains(&image) {
            return Err(RuntimeError::Rejected(format!(
                "failed to start container {id}: exec format error"
            )));
        }

        let info = &mut state.containers[idx].info;
        info.state = ContainerState::Running;
        info.exit_code = None;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        let state = self.lock()?;
        state.check_available()?;
        let idx = state.find(id)?;
        Ok(state.containers[idx].info.clone())
    }

    async fn list_containers(&self, selector: &Labels) -> RuntimeResult<Vec<ContainerInfo>> {
        let state = self.lock()?;
        state.check_available()?;
        Ok(state
            .containers
            .iter()
            .filter(|c| matches_selector(&c.info.labels, selector))
            .map(|c| c.info.clone())
            .collect())
    }

    async fn remove_container(&self, id: &str, remove_volumes: bool) -> RuntimeResult<()> {
        let mut state = self.lock()?;
        state.check_available()?;

        let idx = state.find(id)?;
        let removed = state.containers.remove(idx);
        if remove_volumes {
            for volume in &removed.info.volumes {
                state.volumes.remove(volume);
            }
        }
        Ok(())
    }

    /// Returns the full history; bounds are applied by the caller.
    async fn container_logs(&self, id: &str, _query: &LogQuery) -> RuntimeResult<Vec<LogLine>> {
        let state = self.lock()?;
        state.check_available()?;
        let idx = state.find(id)?;
        Ok(state.containers[idx].logs.clone())
    }

    async fn inspect_network(&self, name: &str) -> RuntimeResult<Option<NetworkInfo>> {
        // Lets concurrent get-or-create callers interleave between the
        // lookup and the create.
        tokio::task::yield_now().await;
        let state = self.lock()?;
        state.check_available()?;
        Ok(state.networks.get(name).cloned())
    }

    async fn create_network(&self, name: &str, labels: &Labels) -> RuntimeResult<NetworkInfo> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        state.check_available()?;

        if state.networks.contains_key(name) {
            return Err(RuntimeError::AlreadyExists(format!(
                "network with name {name} already exists"
            )));
        }
        let network = NetworkInfo {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            labels: labels.clone(),
        };
        state.networks.insert(name.to_string(), network.clone());
        Ok(network)
    }
}
