//! Container runtime gateway abstraction.
//!
//! The orchestrator drives the runtime through the `RuntimeGateway` trait so
//! the Docker plumbing stays behind one seam (and scriptable in tests).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Container status as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    /// Map a raw runtime status string. Anything unrecognized becomes
    /// `Unknown` rather than failing the whole inspection.
    pub fn from_runtime(raw: &str) -> Self {
        match raw {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Handle to a container known to the runtime.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Runtime identifier.
    pub id: String,

    /// Container name without the leading slash.
    pub name: String,

    /// Last observed status. Refresh the handle for a current value.
    pub status: ContainerStatus,

    /// Address per attached network, keyed by network name. The address stays
    /// empty until the runtime binds one.
    pub networks: HashMap<String, String>,
}

impl ContainerHandle {
    /// Address bound on `network`, once the runtime has assigned one.
    pub fn address_on(&self, network: &str) -> Option<&str> {
        self.networks.get(network).map(String::as_str).filter(|address| !address.is_empty())
    }
}

/// Handle to a network known to the runtime.
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    /// Runtime identifier.
    pub id: String,

    /// Network name.
    pub name: String,

    /// Ids of the containers currently attached.
    pub attached: Vec<String>,
}

/// Port mapping (host:container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host port.
    pub host_port: u16,

    /// Container port.
    pub container_port: u16,

    /// Protocol (tcp, udp).
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self { host_port, container_port, protocol: Protocol::Tcp }
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Specification for running a container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Image reference, either a registry image or a locally built tag.
    pub image: String,

    /// Container name.
    pub name: String,

    /// Network to attach at start.
    pub network: Option<String>,

    /// Published ports.
    pub ports: Vec<PortMapping>,

    /// Environment variables, in insertion order.
    pub env: Vec<(String, String)>,

    /// Keep stdin open and allocate a TTY.
    pub interactive: bool,
}

/// Specification for building an image from a source checkout.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Build context directory.
    pub context_dir: PathBuf,

    /// Dockerfile name, relative to the context.
    pub dockerfile: String,

    /// Tag for the built image.
    pub tag: String,
}

/// Container runtime gateway.
///
/// All runtime integrations implement this trait. Lookups take exact names;
/// `find_container` reports absence as `Ok(None)` while `find_network` errors
/// with `NetworkNotFound`, mirroring how callers branch on each.
#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// Look up a container by exact name.
    async fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>>;

    /// Re-read the attributes of a known container.
    async fn refresh_container(&self, handle: &ContainerHandle) -> Result<ContainerHandle>;

    /// Create and start a container.
    async fn run_container(&self, spec: &RunSpec) -> Result<ContainerHandle>;

    /// Stop a running container, giving it up to `grace` to exit cleanly.
    async fn stop_container(&self, handle: &ContainerHandle, grace: Duration) -> Result<()>;

    /// Remove a stopped container.
    async fn remove_container(&self, handle: &ContainerHandle) -> Result<()>;

    /// Look up a network by exact name.
    async fn find_network(&self, name: &str) -> Result<NetworkHandle>;

    /// Create a private bridge network.
    async fn create_network(&self, name: &str) -> Result<NetworkHandle>;

    /// Remove a network. Attached containers make this fail.
    async fn remove_network(&self, handle: &NetworkHandle) -> Result<()>;

    /// Build an image from a local context.
    async fn build_image(&self, spec: &BuildSpec) -> Result<()>;

    /// Gateway name (for logging).
    fn name(&self) -> &str;
}

pub mod docker;

pub use docker::DockerCli;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn status_parses_runtime_strings() {
        assert_eq!(ContainerStatus::from_runtime("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from_runtime("exited"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from_runtime("gibberish"), ContainerStatus::Unknown);
    }

    #[test]
    fn address_on_ignores_empty_bindings() {
        let mut networks = HashMap::new();
        networks.insert("net-a".to_string(), String::new());
        networks.insert("net-b".to_string(), "172.18.0.2".to_string());
        let handle = ContainerHandle {
            id: "abc".to_string(),
            name: "db".to_string(),
            status: ContainerStatus::Running,
            networks,
        };

        assert_eq!(handle.address_on("net-a"), None);
        assert_eq!(handle.address_on("net-b"), Some("172.18.0.2"));
        assert_eq!(handle.address_on("net-c"), None);
    }
}
