//! Deployment configuration.

use crate::error::{DeployError, Result};
use crate::naming::{Naming, Role};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Git remote for the metadata service sources.
pub const METADATA_SERVICE_REPO: &str = "https://github.com/Netflix/metaflow-service.git";

/// Git remote for the UI sources.
pub const UI_REPO: &str = "https://github.com/Netflix/metaflow-ui.git";

/// Metadata service tags known to work with this deployment layout.
pub const METADATA_SERVICE_VERSIONS: [&str; 6] =
    ["1.0.0", "1.0.1", "2.0.4", "2.0.5", "2.0.6", "2.1.0"];

/// UI tags known to work with this deployment layout.
pub const UI_VERSIONS: [&str; 2] = ["v1.0.0", "v1.0.1"];

/// Tag deployed when a requested version is not in the allow-list.
pub const FALLBACK_VERSION: &str = "master";

/// Default password for the local deployment database. Override it for
/// anything reachable beyond localhost.
pub const DEFAULT_DATABASE_PASSWORD: &str =
    r#"ByvI)Sr_uamaPx$w&Xp_LoB*DVBzTO+3oK{Z_Nw4SRcxut?-B>h]&WD}_mU!AgOm'""#;

/// Credential variables forwarded into the UI backend container when set in
/// the calling environment.
pub const CREDENTIAL_ENV_VARS: [&str; 6] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_DEFAULT_REGION",
    "AWS_REGION",
    "AWS_PROFILE",
];

/// Configuration for one deployment.
///
/// Supplied fresh on every invocation and never persisted. One deployment per
/// runtime per `naming_prefix`; run teardown before changing the prefix or the
/// old resources become unreachable to discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Prefix stamped onto every resource name.
    pub naming_prefix: String,

    /// Base name of the private deployment network.
    pub network_base_name: String,

    pub database_name: String,
    pub database_user: String,
    pub database_password: String,

    /// Host and container port for the database.
    pub database_port: u16,

    /// Requested metadata service tag, resolved against the allow-list.
    pub metadata_version: String,

    /// Requested UI tag, resolved against the allow-list.
    pub ui_version: String,

    /// Host port for the metadata API.
    pub metadata_port: u16,

    /// Host port for the metadata migration API.
    pub migration_port: u16,

    /// Host port for the UI backend.
    pub ui_service_port: u16,

    /// Host port for the UI itself.
    pub ui_port: u16,

    pub metadata_repo: String,
    pub ui_repo: String,

    /// Attempts (one per second) to wait for the database address.
    pub database_address_attempts: u32,

    /// Seconds to wait for a freshly created network to show up in lookups.
    pub network_settle_secs: u64,

    /// Seconds to wait for the database container to report running.
    pub database_settle_secs: u64,

    /// Seconds to wait for the network to drain before removing it.
    pub network_drain_secs: u64,

    /// Environment variables forwarded into the UI backend when set.
    pub credential_env_passthrough: Vec<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            naming_prefix: "mfdeploy".to_string(),
            network_base_name: "metaflow-deployment-network".to_string(),
            database_name: "metaflow".to_string(),
            database_user: "metaflow".to_string(),
            database_password: DEFAULT_DATABASE_PASSWORD.to_string(),
            database_port: 5432,
            metadata_version: "2.1.0".to_string(),
            ui_version: "v1.0.0".to_string(),
            metadata_port: 8080,
            migration_port: 8082,
            ui_service_port: 8083,
            ui_port: 3000,
            metadata_repo: METADATA_SERVICE_REPO.to_string(),
            ui_repo: UI_REPO.to_string(),
            database_address_attempts: 120,
            network_settle_secs: 5,
            database_settle_secs: 20,
            network_drain_secs: 10,
            credential_env_passthrough: CREDENTIAL_ENV_VARS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl DeploymentConfig {
    /// Check the invariants the orchestrator relies on.
    pub fn validate(&self) -> Result<()> {
        if self.naming_prefix.is_empty() {
            return Err(DeployError::InvalidConfig {
                reason: "naming prefix must not be empty".to_string(),
            });
        }
        if self.database_address_attempts == 0 {
            return Err(DeployError::InvalidConfig {
                reason: "database address attempts must be at least 1".to_string(),
            });
        }
        // The network base name is free-form, so it could collide with a
        // container role and break the one-name-per-role invariant.
        let naming = self.naming();
        let network_name = naming.name_for(Role::Network);
        if naming.container_names().contains(&network_name) {
            return Err(DeployError::InvalidConfig {
                reason: format!("network name {} collides with a container name", network_name),
            });
        }
        Ok(())
    }

    /// Name builder for this configuration.
    pub fn naming(&self) -> Naming {
        Naming::new(&self.naming_prefix, &self.network_base_name)
    }

    /// Metadata service tag to deploy.
    pub fn resolved_metadata_version(&self) -> &str {
        resolve_version(&self.metadata_version, &METADATA_SERVICE_VERSIONS)
    }

    /// UI tag to deploy.
    pub fn resolved_ui_version(&self) -> &str {
        resolve_version(&self.ui_version, &UI_VERSIONS)
    }
}

/// Resolve `requested` against `allowed`, falling back to the mainline tag.
fn resolve_version<'a>(requested: &'a str, allowed: &[&str]) -> &'a str {
    if allowed.contains(&requested) {
        requested
    } else {
        warn!(requested, fallback = FALLBACK_VERSION, "Unknown version tag, using fallback");
        FALLBACK_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_versions_pass_through() {
        for tag in METADATA_SERVICE_VERSIONS {
            assert_eq!(resolve_version(tag, &METADATA_SERVICE_VERSIONS), tag);
        }
        assert_eq!(resolve_version("v1.0.1", &UI_VERSIONS), "v1.0.1");
    }

    #[test]
    fn unknown_versions_fall_back_to_mainline() {
        assert_eq!(resolve_version("9.9.9", &METADATA_SERVICE_VERSIONS), FALLBACK_VERSION);
        assert_eq!(resolve_version("", &UI_VERSIONS), FALLBACK_VERSION);
        // UI tags carry a leading v, so the bare number is not acceptable.
        assert_eq!(resolve_version("1.0.0", &UI_VERSIONS), FALLBACK_VERSION);
    }

    #[test]
    fn default_config_is_valid() {
        let config = DeploymentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolved_metadata_version(), "2.1.0");
        assert_eq!(config.resolved_ui_version(), "v1.0.0");
        assert_eq!(config.credential_env_passthrough, CREDENTIAL_ENV_VARS.map(String::from));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let config = DeploymentConfig { naming_prefix: String::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(DeployError::InvalidConfig { .. })));
    }

    #[test]
    fn network_name_colliding_with_a_container_is_rejected() {
        let config =
            DeploymentConfig { network_base_name: "ui".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(DeployError::InvalidConfig { .. })));
    }
}
