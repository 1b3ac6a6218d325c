//! Docker CLI gateway.
//!
//! Drives the local `docker` binary through subprocesses:
//! - containers: run / stop / rm / inspect
//! - networks: create / inspect / rm
//! - images: build from a local context
//!
//! Inspect output is parsed from the JSON the daemon reports.

use crate::error::{DeployError, Result};
use crate::runtime::{
    BuildSpec, ContainerHandle, ContainerStatus, NetworkHandle, RunSpec, RuntimeGateway,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Stderr lines kept for the error report when a build fails.
const ERROR_TAIL_LINES: usize = 20;

/// Docker CLI gateway.
pub struct DockerCli {
    /// Path to the docker binary.
    binary_path: PathBuf,
}

impl DockerCli {
    /// Connect to the local runtime, verifying the daemon answers.
    pub async fn connect() -> Result<Self> {
        let gateway = Self { binary_path: Self::find_binary() };
        gateway.ping().await?;
        Ok(gateway)
    }

    /// Find the docker binary in the usual locations, falling back to PATH.
    fn find_binary() -> PathBuf {
        let candidates = [
            PathBuf::from("/usr/local/bin/docker"),
            PathBuf::from("/usr/bin/docker"),
            PathBuf::from("/opt/homebrew/bin/docker"),
        ];

        for path in candidates {
            if path.exists() {
                return path;
            }
        }

        PathBuf::from("docker")
    }

    async fn ping(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .args(["version", "--format", "{{.Server.Version}}"])
            .output()
            .await
            .map_err(|e| DeployError::RuntimeUnavailable {
                reason: format!("failed to invoke {}: {}", self.binary_path.display(), e),
            })?;

        if !output.status.success() {
            return Err(DeployError::RuntimeUnavailable {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            server = %String::from_utf8_lossy(&output.stdout).trim(),
            "Container runtime reachable"
        );
        Ok(())
    }

    /// Run one docker subcommand to completion, returning its stdout.
    async fn exec<I, S>(&self, operation: &str, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|arg| arg.as_ref().to_os_string()).collect();
        debug!(operation, ?args, "Invoking docker");

        let output = Command::new(&self.binary_path).args(&args).output().await.map_err(|e| {
            DeployError::RuntimeCommand {
                operation: operation.to_string(),
                reason: format!("failed to spawn docker: {}", e),
            }
        })?;

        if !output.status.success() {
            return Err(DeployError::RuntimeCommand {
                operation: operation.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<ContainerHandle> {
        let stdout =
            self.exec("inspect", ["inspect", "--type", "container", name_or_id]).await?;
        parse_container_inspect(name_or_id, &stdout)
    }

    async fn inspect_network(&self, name_or_id: &str) -> Result<NetworkHandle> {
        let stdout = self.exec("network inspect", ["inspect", "--type", "network", name_or_id]).await?;
        parse_network_inspect(name_or_id, &stdout)
    }
}

#[async_trait]
impl RuntimeGateway for DockerCli {
    async fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>> {
        match self.inspect_container(name).await {
            Ok(handle) => Ok(Some(handle)),
            Err(DeployError::RuntimeCommand { ref reason, .. }) if is_missing(reason) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn refresh_container(&self, handle: &ContainerHandle) -> Result<ContainerHandle> {
        self.inspect_container(&handle.id).await
    }

    #[instrument(skip(self, spec), fields(container = %spec.name, image = %spec.image))]
    async fn run_container(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        info!("Starting container");
        let stdout = self.exec("run", run_args(spec)).await?;
        let id = String::from_utf8_lossy(&stdout).trim().to_string();
        let handle = self.inspect_container(&id).await?;
        debug!(id = %handle.id, "Container started");
        Ok(handle)
    }

    async fn stop_container(&self, handle: &ContainerHandle, grace: Duration) -> Result<()> {
        let grace_secs = grace.as_secs().to_string();
        self.exec("stop", ["stop", "--time", grace_secs.as_str(), handle.id.as_str()]).await?;
        Ok(())
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<()> {
        self.exec("rm", ["rm", handle.id.as_str()]).await?;
        Ok(())
    }

    async fn find_network(&self, name: &str) -> Result<NetworkHandle> {
        match self.inspect_network(name).await {
            Ok(handle) => Ok(handle),
            Err(DeployError::RuntimeCommand { ref reason, .. }) if is_missing(reason) => {
                Err(DeployError::NetworkNotFound { network_name: name.to_string() })
            }
            Err(err) => Err(err),
        }
    }

    async fn create_network(&self, name: &str) -> Result<NetworkHandle> {
        info!(network = %name, "Creating network");
        self.exec("network create", ["network", "create", "--driver", "bridge", name]).await?;
        self.inspect_network(name).await
    }

    async fn remove_network(&self, handle: &NetworkHandle) -> Result<()> {
        self.exec("network rm", ["network", "rm", handle.id.as_str()]).await?;
        Ok(())
    }

    #[instrument(skip(self, spec), fields(tag = %spec.tag))]
    async fn build_image(&self, spec: &BuildSpec) -> Result<()> {
        info!(context = %spec.context_dir.display(), dockerfile = %spec.dockerfile, "Building image");

        let mut child = Command::new(&self.binary_path)
            .args(["build", "--file", &spec.dockerfile, "--tag", &spec.tag, "."])
            .current_dir(&spec.context_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DeployError::BuildFailed {
                image: spec.tag.clone(),
                reason: format!("failed to spawn docker build: {}", e),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Stream both pipes as they fill; docker blocks when either backs up.
        let progress = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(image = %spec.tag, "{}", line);
                }
            }
        };
        let collect_tail = async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(image = %spec.tag, "{}", line);
                    if tail.len() == ERROR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        };
        let (_, tail) = tokio::join!(progress, collect_tail);

        let status = child.wait().await.map_err(|e| DeployError::BuildFailed {
            image: spec.tag.clone(),
            reason: format!("failed to wait for docker build: {}", e),
        })?;

        if !status.success() {
            return Err(DeployError::BuildFailed {
                image: spec.tag.clone(),
                reason: Vec::from(tail).join("\n"),
            });
        }

        debug!("Image built");
        Ok(())
    }

    fn name(&self) -> &str {
        "docker"
    }
}

/// Assemble the argument list for `docker run`.
fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--detach".to_string()];

    if spec.interactive {
        args.push("--interactive".to_string());
        args.push("--tty".to_string());
    }

    args.push("--name".to_string());
    args.push(spec.name.clone());

    if let Some(network) = &spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    for port in &spec.ports {
        args.push("--publish".to_string());
        args.push(format!("{}:{}/{}", port.host_port, port.container_port, port.protocol));
    }

    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image.clone());
    args
}

/// Docker reports missing objects on stderr as "No such container: x",
/// "No such network: x", or "No such object: x" depending on the subcommand.
fn is_missing(reason: &str) -> bool {
    reason.contains("No such")
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: ContainerState,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkSettings {
    #[serde(rename = "Networks", default)]
    networks: HashMap<String, NetworkEndpoint>,
}

#[derive(Debug, Deserialize)]
struct NetworkEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct NetworkInspect {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Containers", default)]
    containers: HashMap<String, serde_json::Value>,
}

fn parse_container_inspect(subject: &str, bytes: &[u8]) -> Result<ContainerHandle> {
    let inspected: Vec<ContainerInspect> =
        serde_json::from_slice(bytes).map_err(|e| DeployError::InvalidAttributes {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;
    let raw = inspected.into_iter().next().ok_or_else(|| DeployError::InvalidAttributes {
        subject: subject.to_string(),
        reason: "empty inspect output".to_string(),
    })?;

    let networks = raw
        .network_settings
        .networks
        .into_iter()
        .map(|(name, endpoint)| (name, endpoint.ip_address))
        .collect();

    Ok(ContainerHandle {
        id: raw.id,
        // Docker prefixes container names with a slash in inspect output.
        name: raw.name.trim_start_matches('/').to_string(),
        status: ContainerStatus::from_runtime(&raw.state.status),
        networks,
    })
}

fn parse_network_inspect(subject: &str, bytes: &[u8]) -> Result<NetworkHandle> {
    let inspected: Vec<NetworkInspect> =
        serde_json::from_slice(bytes).map_err(|e| DeployError::InvalidAttributes {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;
    let raw = inspected.into_iter().next().ok_or_else(|| DeployError::InvalidAttributes {
        subject: subject.to_string(),
        reason: "empty inspect output".to_string(),
    })?;

    Ok(NetworkHandle {
        id: raw.id,
        name: raw.name,
        attached: raw.containers.into_keys().collect(),
    })
}
