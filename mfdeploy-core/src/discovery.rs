//! Deployment discovery.
//!
//! Looks up every resource the deployment owns by its canonical name and
//! classifies what it finds. Discovery never mutates the runtime; create
//! uses it to refuse double provisioning, teardown to know what to remove,
//! and check to report status.

use crate::error::{DeployError, Result};
use crate::naming::{Naming, Role};
use crate::runtime::{ContainerHandle, NetworkHandle, RuntimeGateway};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Classification of the resources found for one deployment prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentState {
    /// None of the deployment's resources exist.
    NoDeployment,

    /// Some resources exist but not all of them.
    Partial,

    /// Every container and the network exist.
    Complete,
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentState::NoDeployment => write!(f, "absent"),
            DeploymentState::Partial => write!(f, "partial"),
            DeploymentState::Complete => write!(f, "complete"),
        }
    }
}

/// Everything found for one deployment prefix at a point in time.
#[derive(Debug, Default)]
pub struct DeploymentSnapshot {
    /// The private network, when present.
    pub network: Option<NetworkHandle>,

    /// The database container, when present.
    pub database: Option<ContainerHandle>,

    /// The metadata service container, when present.
    pub metadata_service: Option<ContainerHandle>,

    /// The UI backend container, when present.
    pub ui_service: Option<ContainerHandle>,

    /// The UI frontend container, when present.
    pub ui: Option<ContainerHandle>,
}

impl DeploymentSnapshot {
    /// Names of the resources that exist, containers first and the
    /// network last.
    pub fn present_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.containers().into_iter().map(|c| c.name.clone()).collect();
        if let Some(network) = &self.network {
            names.push(network.name.clone());
        }
        names
    }

    /// Present containers in provisioning order.
    pub fn containers(&self) -> Vec<&ContainerHandle> {
        [&self.database, &self.metadata_service, &self.ui_service, &self.ui]
            .into_iter()
            .filter_map(|slot| slot.as_ref())
            .collect()
    }

    /// Classify the snapshot by how many of the five resources exist.
    pub fn state(&self) -> DeploymentState {
        let present = self.containers().len() + usize::from(self.network.is_some());
        match present {
            0 => DeploymentState::NoDeployment,
            5 => DeploymentState::Complete,
            _ => DeploymentState::Partial,
        }
    }
}

/// Look up the network and all four containers by their canonical names.
pub async fn discover(
    gateway: &dyn RuntimeGateway,
    naming: &Naming,
) -> Result<DeploymentSnapshot> {
    let network = match gateway.find_network(&naming.name_for(Role::Network)).await {
        Ok(handle) => Some(handle),
        Err(DeployError::NetworkNotFound { .. }) => None,
        Err(err) => return Err(err),
    };

    let snapshot = DeploymentSnapshot {
        network,
        database: gateway.find_container(&naming.name_for(Role::Database)).await?,
        metadata_service: gateway
            .find_container(&naming.name_for(Role::MetadataService))
            .await?,
        ui_service: gateway.find_container(&naming.name_for(Role::UiService)).await?,
        ui: gateway.find_container(&naming.name_for(Role::Ui)).await?,
    };

    debug!(state = %snapshot.state(), present = ?snapshot.present_names(), "Discovered deployment");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ContainerStatus;
    use std::collections::HashMap;

    fn container(name: &str) -> ContainerHandle {
        ContainerHandle {
            id: format!("id-{}", name),
            name: name.to_string(),
            status: ContainerStatus::Running,
            networks: HashMap::new(),
        }
    }

    fn network(name: &str) -> NetworkHandle {
        NetworkHandle { id: format!("id-{}", name), name: name.to_string(), attached: vec![] }
    }

    #[test]
    fn empty_snapshot_is_no_deployment() {
        let snapshot = DeploymentSnapshot::default();
        assert_eq!(snapshot.state(), DeploymentState::NoDeployment);
        assert!(snapshot.present_names().is_empty());
    }

    #[test]
    fn lone_network_is_partial() {
        let snapshot = DeploymentSnapshot {
            network: Some(network("mfdeploy-metaflow-deployment-network")),
            ..Default::default()
        };
        assert_eq!(snapshot.state(), DeploymentState::Partial);
    }

    #[test]
    fn missing_one_container_is_partial() {
        let snapshot = DeploymentSnapshot {
            network: Some(network("mfdeploy-metaflow-deployment-network")),
            database: Some(container("mfdeploy-postgres")),
            metadata_service: Some(container("mfdeploy-metadata-service")),
            ui_service: Some(container("mfdeploy-ui-service")),
            ui: None,
        };
        assert_eq!(snapshot.state(), DeploymentState::Partial);
    }

    #[test]
    fn all_five_resources_are_complete() {
        let snapshot = DeploymentSnapshot {
            network: Some(network("mfdeploy-metaflow-deployment-network")),
            database: Some(container("mfdeploy-postgres")),
            metadata_service: Some(container("mfdeploy-metadata-service")),
            ui_service: Some(container("mfdeploy-ui-service")),
            ui: Some(container("mfdeploy-ui")),
        };
        assert_eq!(snapshot.state(), DeploymentState::Complete);
    }

    #[test]
    fn present_names_list_containers_before_the_network() {
        let snapshot = DeploymentSnapshot {
            network: Some(network("mfdeploy-metaflow-deployment-network")),
            database: Some(container("mfdeploy-postgres")),
            metadata_service: None,
            ui_service: None,
            ui: Some(container("mfdeploy-ui")),
        };
        assert_eq!(
            snapshot.present_names(),
            vec!["mfdeploy-postgres", "mfdeploy-ui", "mfdeploy-metaflow-deployment-network"]
        );
    }
}
