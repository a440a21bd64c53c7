//! # Docker Runtime - Docker Daemon via the CLI
//!
//! Implements [`ContainerRuntime`] by invoking the `docker` binary with
//! `tokio::process`. Every call is one CLI invocation (or a short fixed
//! sequence), bounded by [`RUNTIME_COMMAND_TIMEOUT`].
//!
//! ## Command Mapping
//!
//! | Operation            | Command                                               |
//! |----------------------|-------------------------------------------------------|
//! | `create_container`   | `docker create --name … --label … IMAGE [CMD…]`       |
//! | `start_container`    | `docker start ID`                                     |
//! | `inspect_container`  | `docker inspect --type container ID`                  |
//! | `list_containers`    | `docker ps -a --no-trunc --filter label=k=v` + inspect |
//! | `remove_container`   | `docker rm --force [--volumes] ID` + `docker volume rm` |
//! | `container_logs`     | `docker logs --timestamps [--since] [--tail] ID`      |
//! | `inspect_network`    | `docker network inspect NAME`                         |
//! | `create_network`     | `docker network create --driver bridge --label … NAME` |
//!
//! ## Error Classification
//!
//! The CLI reports every failure as a non-zero exit with a message on
//! stderr. [`classify_failure`] maps the daemon's messages onto
//! [`RuntimeError`] variants; anything unrecognized stays
//! [`RuntimeError::CommandFailed`].
//!
//! ## Output Bounds
//!
//! Each pipe is captured up to [`MAX_COMMAND_OUTPUT`]. Output beyond that
//! fails the call with [`RuntimeError::OutputTooLarge`] instead of being
//! cut, so a listing or log read never returns partial data. Listings
//! inspect at most [`INSPECT_BATCH_SIZE`] containers per call; log reads
//! stay under the bound when the caller passes a line count.
//!
//! ## Volumes
//!
//! `docker rm --volumes` only removes anonymous volumes. Named volumes
//! (the `<container>-data` mounts) are collected from `inspect` before
//! removal and deleted with `docker volume rm` afterwards.

use crate::constants::{
    INSPECT_BATCH_SIZE, MAX_COMMAND_OUTPUT, MAX_ERROR_DETAIL_LEN, RUNTIME_COMMAND_TIMEOUT,
    RUNTIME_PROBE_TIMEOUT,
};
use crate::runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, ContainerState, Labels, LogLine, LogQuery,
    NetworkInfo, RuntimeError, RuntimeResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Docker CLI backend.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
    host: Option<String>,
}

impl DockerRuntime {
    /// Creates a runtime that invokes `binary`, optionally against `host`.
    pub fn new(binary: impl Into<String>, host: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            host,
        }
    }

    /// Checks that the CLI is installed and the daemon answers.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Unavailable`] if either is not the case.
    pub async fn probe(&self) -> RuntimeResult<()> {
        let output = self
            .exec(
                &["version", "--format", "{{.Server.Version}}"],
                RUNTIME_PROBE_TIMEOUT,
            )
            .await
            .map_err(|e| match e {
                RuntimeError::Timeout { .. } => RuntimeError::Unavailable(e.to_string()),
                other => other,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::Unavailable(truncate_detail(&String::from_utf8_lossy(
                &output.stderr,
            ))));
        }
        debug!(
            server_version = %String::from_utf8_lossy(&output.stdout).trim(),
            "docker daemon reachable"
        );
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("--host").arg(host);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Runs a command and returns its raw output, successful or not.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::OutputTooLarge`] if either pipe exceeds
    /// [`MAX_COMMAND_OUTPUT`].
    async fn exec(&self, args: &[&str], timeout_dur: Duration) -> RuntimeResult<Output> {
        let command_line = format!("docker {}", args.join(" "));
        debug!(command = %command_line, "running docker command");

        let mut cmd = self.command();
        cmd.args(args);

        let output = timeout(timeout_dur, cmd.output())
            .await
            .map_err(|_| RuntimeError::Timeout {
                command: command_line.clone(),
                duration: timeout_dur,
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RuntimeError::Unavailable(format!(
                    "docker binary '{}' not found",
                    self.binary
                )),
                _ => RuntimeError::Io(e),
            })?;

        check_output_size(&command_line, &output.stdout, MAX_COMMAND_OUTPUT)?;
        check_output_size(&command_line, &output.stderr, MAX_COMMAND_OUTPUT)?;
        Ok(output)
    }

    /// Runs a command and returns its stdout, classifying a failure.
    ///
    /// `target` names the object the command acts on, for error messages.
    async fn run(&self, args: &[&str], target: &str) -> RuntimeResult<String> {
        let output = self.exec(args, RUNTIME_COMMAND_TIMEOUT).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let command = format!("docker {}", args.first().copied().unwrap_or_default());
        Err(classify_failure(
            &String::from_utf8_lossy(&output.stderr),
            target,
            command,
            output.status.code(),
        ))
    }

    async fn inspect_many(&self, ids: &[String]) -> RuntimeResult<Vec<ContainerInfo>> {
        let mut args = vec!["inspect", "--type", "container"];
        args.extend(ids.iter().map(String::as_str));
        let stdout = self.run(&args, &ids.join(",")).await?;
        parse_inspect(&stdout)
    }
}

/// Fails when one captured pipe exceeds `limit` bytes.
fn check_output_size(command_line: &str, stream: &[u8], limit: usize) -> RuntimeResult<()> {
    if stream.len() <= limit {
        return Ok(());
    }
    warn!(command = %command_line, bytes = stream.len(), limit, "docker output too large");
    Err(RuntimeError::OutputTooLarge {
        command: command_line.to_string(),
        limit,
    })
}

// =============================================================================
// Argument Construction
// =============================================================================

/// Builds the `docker create` argument list for a spec.
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }

    args.push("--network".to_string());
    args.push(spec.network.clone());
    args.push("--restart".to_string());
    args.push(spec.restart_policy.to_string());

    if let Some(cpus) = spec.cpus {
        args.push("--cpus".to_string());
        args.push(cpus.to_string());
    }
    if let Some(memory) = spec.memory_mb {
        args.push("--memory".to_string());
        args.push(format!("{memory}m"));
    }
    for endpoint in &spec.exposed_ports {
        args.push("--expose".to_string());
        args.push(endpoint.to_string());
    }
    if let Some(volume) = &spec.volume {
        args.push("--mount".to_string());
        args.push(format!(
            "type=volume,source={},target={}",
            volume.name, volume.path
        ));
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

// =============================================================================
// Failure Classification
// =============================================================================

fn truncate_detail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_ERROR_DETAIL_LEN {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_DETAIL_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Maps a failed CLI invocation onto a [`RuntimeError`].
pub fn classify_failure(
    stderr: &str,
    target: &str,
    command: String,
    code: Option<i32>,
) -> RuntimeError {
    let detail = truncate_detail(stderr);
    let lower = detail.to_ascii_lowercase();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("error during connect")
        || lower.contains("is the docker daemon running")
    {
        return RuntimeError::Unavailable(detail);
    }
    if lower.contains("no such container") {
        return RuntimeError::ContainerNotFound(target.to_string());
    }
    if lower.contains("no such network")
        || (lower.contains("network") && lower.contains("not found"))
    {
        return RuntimeError::NetworkNotFound(target.to_string());
    }
    if lower.contains("already in use") || lower.contains("already exists") {
        return RuntimeError::AlreadyExists(detail);
    }
    if lower.contains("no such image")
        || lower.contains("pull access denied")
        || lower.contains("manifest unknown")
        || lower.contains("repository does not exist")
        || (lower.contains("manifest for") && lower.contains("not found"))
    {
        return RuntimeError::ImageNotFound(detail);
    }
    if lower.contains("invalid reference format") || lower.contains("invalid argument") {
        return RuntimeError::Rejected(detail);
    }

    RuntimeError::CommandFailed {
        command,
        code,
        stderr: detail,
    }
}

// =============================================================================
// Output Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectContainer {
    id: String,
    name: String,
    created: DateTime<Utc>,
    config: InspectConfig,
    state: InspectState,
    #[serde(default)]
    mounts: Vec<InspectMount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
    #[serde(default)]
    labels: Option<Labels>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    #[serde(default)]
    exit_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    id: String,
    name: String,
    #[serde(default)]
    labels: Option<Labels>,
}

/// Parses `docker inspect --type container` output.
fn parse_inspect(stdout: &str) -> RuntimeResult<Vec<ContainerInfo>> {
    let raw: Vec<InspectContainer> = serde_json::from_str(stdout)
        .map_err(|e| RuntimeError::Parse(format!("docker inspect: {e}")))?;

    Ok(raw
        .into_iter()
        .map(|c| {
            let state = ContainerState::parse(&c.state.status);
            // The daemon reports 0 for containers that never ran.
            let exit_code = match state {
                ContainerState::Exited | ContainerState::Dead => c.state.exit_code,
                _ => None,
            };
            ContainerInfo {
                id: c.id,
                name: c.name.trim_start_matches('/').to_string(),
                image: c.config.image,
                labels: c.config.labels.unwrap_or_default(),
                state,
                exit_code,
                created_at: c.created,
                volumes: c
                    .mounts
                    .into_iter()
                    .filter(|m| m.kind == "volume")
                    .filter_map(|m| m.name)
                    .collect(),
            }
        })
        .collect())
}

/// Parses `docker network inspect` output.
fn parse_network_inspect(stdout: &str) -> RuntimeResult<Option<NetworkInfo>> {
    let raw: Vec<InspectNetwork> = serde_json::from_str(stdout)
        .map_err(|e| RuntimeError::Parse(format!("docker network inspect: {e}")))?;
    Ok(raw.into_iter().next().map(|n| NetworkInfo {
        id: n.id,
        name: n.name,
        labels: n.labels.unwrap_or_default(),
    }))
}

/// Parses `docker logs --timestamps` output. Lines without a leading
/// RFC 3339 timestamp are attached to the previous line's timestamp.
fn parse_log_lines(out: &str) -> Vec<LogLine> {
    let mut lines = Vec::new();
    let mut last = DateTime::<Utc>::MIN_UTC;

    for raw in out.lines() {
        let parsed = raw.split_once(' ').and_then(|(ts, text)| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|ts| (ts.with_timezone(&Utc), text))
        });
        match parsed {
            Some((ts, text)) => {
                last = ts;
                lines.push(LogLine::new(ts, text));
            }
            None => match DateTime::parse_from_rfc3339(raw) {
                // Empty line: the CLI prints the bare timestamp.
                Ok(ts) => {
                    last = ts.with_timezone(&Utc);
                    lines.push(LogLine::new(last, ""));
                }
                Err(_) => lines.push(LogLine::new(last, raw)),
            },
        }
    }
    lines
}

// =============================================================================
// ContainerRuntime
// =============================================================================

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<String> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(&args, &spec.name).await?;

        let id = stdout.trim();
        if id.is_empty() {
            return Err(RuntimeError::Parse(
                "docker create printed no container id".to_string(),
            ));
        }
        Ok(id.to_string())
    }

    async fn start_container(&self, id: &str) -> RuntimeResult<()> {
        self.run(&["start", id], id).await.map(|_| ())
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        self.inspect_many(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))
    }

    async fn list_containers(&self, selector: &Labels) -> RuntimeResult<Vec<ContainerInfo>> {
        let filters: Vec<String> = selector
            .iter()
            .map(|(k, v)| format!("label={k}={v}"))
            .collect();
        let mut args = vec!["ps", "-a", "--no-trunc", "--format", "{{.ID}}"];
        for filter in &filters {
            args.push("--filter");
            args.push(filter);
        }

        let stdout = self.run(&args, "containers").await?;
        let ids: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut infos = Vec::with_capacity(ids.len());
        for batch in ids.chunks(INSPECT_BATCH_SIZE) {
            match self.inspect_many(batch).await {
                Ok(found) => infos.extend(found),
                // A container was removed between `ps` and `inspect`.
                Err(RuntimeError::ContainerNotFound(_)) => {
                    for id in batch {
                        match self.inspect_container(id).await {
                            Ok(info) => infos.push(info),
                            Err(RuntimeError::ContainerNotFound(_)) => {}
                            Err(e) => return Err(e),
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(infos)
    }

    async fn remove_container(&self, id: &str, remove_volumes: bool) -> RuntimeResult<()> {
        let named_volumes = if remove_volumes {
            self.inspect_container(id).await?.volumes
        } else {
            Vec::new()
        };

        let mut args = vec!["rm", "--force"];
        if remove_volumes {
            args.push("--volumes");
        }
        args.push(id);
        self.run(&args, id).await?;

        for volume in &named_volumes {
            if let Err(e) = self.run(&["volume", "rm", volume], volume).await {
                warn!(container = %id, volume = %volume, error = %e, "failed to remove volume");
            }
        }
        Ok(())
    }

    /// Unbounded reads of very large logs fail with
    /// [`RuntimeError::OutputTooLarge`]; pass `query.tail` to read the end.
    async fn container_logs(&self, id: &str, query: &LogQuery) -> RuntimeResult<Vec<LogLine>> {
        let since_arg;
        let tail_arg;
        let mut args = vec!["logs", "--timestamps"];
        if let Some(since) = query.since {
            // Whole seconds only; widened by one so the boundary line is kept.
            since_arg = (since.timestamp() - 1).to_string();
            args.push("--since");
            args.push(&since_arg);
        }
        if let Some(tail) = query.tail {
            tail_arg = tail.to_string();
            args.push("--tail");
            args.push(&tail_arg);
        }
        args.push(id);

        let output = self.exec(&args, RUNTIME_COMMAND_TIMEOUT).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(classify_failure(&stderr, id, "docker logs".to_string(), output.status.code()));
        }

        // stdout and stderr arrive on separate pipes; merge by timestamp.
        let mut lines = parse_log_lines(&String::from_utf8_lossy(&output.stdout));
        lines.extend(parse_log_lines(&stderr));
        lines.sort_by_key(|l| l.timestamp);
        Ok(lines)
    }

    async fn inspect_network(&self, name: &str) -> RuntimeResult<Option<NetworkInfo>> {
        match self.run(&["network", "inspect", name], name).await {
            Ok(stdout) => parse_network_inspect(&stdout),
            Err(RuntimeError::NetworkNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_network(&self, name: &str, labels: &Labels) -> RuntimeResult<NetworkInfo> {
        let label_args: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec!["network", "create", "--driver", "bridge"];
        for label in &label_args {
            args.push("--label");
            args.push(label);
        }
        args.push(name);

        let stdout = self.run(&args, name).await?;
        Ok(NetworkInfo {
            id: stdout.trim().to_string(),
            name: name.to_string(),
            labels: labels.clone(),
        })
    }
}
