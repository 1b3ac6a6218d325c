//! Canonical resource naming.
//!
//! Every resource of a deployment gets a name derived purely from the naming
//! prefix and its role. Discovery relies on these names being stable, so they
//! must never depend on runtime state.

use serde::{Deserialize, Serialize};

/// Roles a deployment resource can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Database,
    MetadataService,
    UiService,
    Ui,
    Network,
}

impl Role {
    /// Container roles in provisioning order. The network is handled apart
    /// from the containers everywhere it matters.
    pub const CONTAINERS: [Role; 4] =
        [Role::Database, Role::MetadataService, Role::UiService, Role::Ui];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::MetadataService => write!(f, "metadata-service"),
            Self::UiService => write!(f, "ui-service"),
            Self::Ui => write!(f, "ui"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Name builder for one deployment.
#[derive(Debug, Clone)]
pub struct Naming {
    prefix: String,
    network_base: String,
}

impl Naming {
    pub fn new(prefix: impl Into<String>, network_base: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), network_base: network_base.into() }
    }

    /// Canonical name for `role`: `<prefix>-<base>`.
    pub fn name_for(&self, role: Role) -> String {
        let base = match role {
            Role::Database => "postgres",
            Role::MetadataService => "metadata-service",
            Role::UiService => "ui-service",
            Role::Ui => "ui",
            Role::Network => self.network_base.as_str(),
        };
        format!("{}-{}", self.prefix, base)
    }

    /// Canonical container names in provisioning order.
    pub fn container_names(&self) -> Vec<String> {
        Role::CONTAINERS.iter().map(|role| self.name_for(*role)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_deterministic() {
        let naming = Naming::new("mfdeploy", "metaflow-deployment-network");
        assert_eq!(naming.name_for(Role::Database), "mfdeploy-postgres");
        assert_eq!(naming.name_for(Role::Database), naming.name_for(Role::Database));
        assert_eq!(naming.name_for(Role::Network), "mfdeploy-metaflow-deployment-network");
    }

    #[test]
    fn names_are_distinct_across_roles() {
        let naming = Naming::new("mfdeploy", "metaflow-deployment-network");
        let all: HashSet<String> =
            [Role::Database, Role::MetadataService, Role::UiService, Role::Ui, Role::Network]
                .iter()
                .map(|role| naming.name_for(*role))
                .collect();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn prefix_changes_every_name() {
        let naming = Naming::new("staging", "metaflow-deployment-network");
        for name in naming.container_names() {
            assert!(name.starts_with("staging-"), "unexpected name {name}");
        }
    }

    #[test]
    fn container_names_follow_provisioning_order() {
        let naming = Naming::new("mfdeploy", "metaflow-deployment-network");
        assert_eq!(
            naming.container_names(),
            vec![
                "mfdeploy-postgres",
                "mfdeploy-metadata-service",
                "mfdeploy-ui-service",
                "mfdeploy-ui"
            ]
        );
    }
}
