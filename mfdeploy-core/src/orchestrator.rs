//! Deployment lifecycle orchestration.
//!
//! Drives the full create / teardown / check lifecycle over a
//! [`RuntimeGateway`] and a [`SourceFetcher`]. Provisioning is strictly
//! ordered: the network first, then the database, then the services that
//! need the database address in their environment.

use crate::config::DeploymentConfig;
use crate::discovery::{self, DeploymentState};
use crate::error::{DeployError, Result};
use crate::fetch::{CheckoutSpec, SourceFetcher};
use crate::naming::{Naming, Role};
use crate::resolver;
use crate::runtime::{
    BuildSpec, ContainerHandle, ContainerStatus, PortMapping, RunSpec, RuntimeGateway,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Image the database container runs. The services are built from source;
/// the database comes straight off the registry.
const DATABASE_IMAGE: &str = "postgres:latest";

/// Dockerfiles inside the service checkouts. Both metadata service images
/// are built from the same checkout.
const METADATA_DOCKERFILE: &str = "Dockerfile";
const UI_SERVICE_DOCKERFILE: &str = "Dockerfile.ui_service";
const UI_DOCKERFILE: &str = "Dockerfile";

/// Fixed ports the services listen on inside their containers.
const METADATA_CONTAINER_PORT: u16 = 8080;
const MIGRATION_CONTAINER_PORT: u16 = 8082;
const UI_SERVICE_CONTAINER_PORT: u16 = 8083;
const UI_CONTAINER_PORT: u16 = 3000;

/// Spacing between readiness re-checks.
const SETTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Grace given to a container between SIGTERM and SIGKILL on teardown.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Status report produced by [`Orchestrator::check`].
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// Overall classification of the deployment.
    pub state: DeploymentState,

    /// Names of the resources that exist, containers first.
    pub present: Vec<String>,
}

/// What a teardown actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Resources existed and were removed, listed containers first.
    Removed { resources: Vec<String> },

    /// Nothing belonging to the deployment was found.
    NoDeployment,
}

/// Orchestrates one deployment against a container runtime.
pub struct Orchestrator {
    gateway: Arc<dyn RuntimeGateway>,
    fetcher: Arc<dyn SourceFetcher>,
    config: DeploymentConfig,
    naming: Naming,
}

impl Orchestrator {
    /// Build an orchestrator for one deployment, validating the
    /// configuration first. Every constructed orchestrator holds five
    /// distinct resource names.
    pub fn new(
        gateway: Arc<dyn RuntimeGateway>,
        fetcher: Arc<dyn SourceFetcher>,
        config: DeploymentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let naming = config.naming();
        Ok(Self { gateway, fetcher, config, naming })
    }

    /// Provision the full deployment.
    ///
    /// Refuses to run when any resource with a canonical name already
    /// exists; the operator must tear the old deployment down first.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<()> {
        let snapshot = discovery::discover(self.gateway.as_ref(), &self.naming).await?;
        if snapshot.state() != DeploymentState::NoDeployment {
            return Err(DeployError::ExistingDeployment {
                resources: snapshot.present_names(),
            });
        }

        let network = self.gateway.create_network(&self.naming.name_for(Role::Network)).await?;
        self.await_network_visible(&network.name).await?;

        let database = self.run_database(&network.name).await?;
        self.await_container_running(&database, self.config.database_settle_secs).await?;

        let database_address = resolver::resolve_address(
            self.gateway.as_ref(),
            &database,
            &network.name,
            self.config.database_address_attempts,
        )
        .await?;
        info!(address = %database_address, "Database reachable on the deployment network");

        let metadata_version = self.config.resolved_metadata_version().to_string();
        let ui_version = self.config.resolved_ui_version().to_string();

        let metadata_checkout =
            self.checkout(&self.config.metadata_repo, &metadata_version, "mfdeploy-metadata-").await?;
        let ui_checkout = self.checkout(&self.config.ui_repo, &ui_version, "mfdeploy-ui-").await?;

        self.start_metadata_service(metadata_checkout.path(), &network.name, &database_address)
            .await?;
        self.start_ui_service(metadata_checkout.path(), &network.name, &database_address)
            .await?;
        self.start_ui(ui_checkout.path(), &network.name).await?;

        info!(
            ui = %format!("http://localhost:{}", self.config.ui_port),
            metadata_service = %format!("http://localhost:{}", self.config.metadata_port),
            "Deployment ready"
        );
        Ok(())
    }

    /// Remove every resource the deployment owns.
    ///
    /// Containers come down strictly before the network so no endpoint is
    /// still attached when the network is removed. A container failure
    /// aborts the teardown with the network left in place.
    #[instrument(skip(self))]
    pub async fn teardown(&self) -> Result<TeardownOutcome> {
        let snapshot = discovery::discover(self.gateway.as_ref(), &self.naming).await?;
        if snapshot.state() == DeploymentState::NoDeployment {
            info!("No deployment found");
            return Ok(TeardownOutcome::NoDeployment);
        }

        let resources = snapshot.present_names();

        for container in snapshot.containers() {
            info!(container = %container.name, "Stopping container");
            self.gateway.stop_container(container, STOP_GRACE).await?;
            let stopped = self.gateway.refresh_container(container).await?;
            self.gateway.remove_container(&stopped).await?;
        }

        if let Some(network) = &snapshot.network {
            self.await_network_drained(&network.name).await?;
            info!(network = %network.name, "Removing network");
            self.gateway.remove_network(network).await?;
        }

        Ok(TeardownOutcome::Removed { resources })
    }

    /// Report what exists without touching anything.
    pub async fn check(&self) -> Result<CheckReport> {
        let snapshot = discovery::discover(self.gateway.as_ref(), &self.naming).await?;
        Ok(CheckReport { state: snapshot.state(), present: snapshot.present_names() })
    }

    async fn run_database(&self, network_name: &str) -> Result<ContainerHandle> {
        let spec = RunSpec {
            image: DATABASE_IMAGE.to_string(),
            name: self.naming.name_for(Role::Database),
            network: Some(network_name.to_string()),
            ports: vec![PortMapping::tcp(self.config.database_port, self.config.database_port)],
            env: self.database_env(),
            interactive: false,
        };
        self.gateway.run_container(&spec).await
    }

    async fn start_metadata_service(
        &self,
        checkout: &Path,
        network_name: &str,
        database_address: &str,
    ) -> Result<ContainerHandle> {
        let name = self.naming.name_for(Role::MetadataService);
        self.build_from_checkout(checkout, METADATA_DOCKERFILE, &name).await?;

        let spec = RunSpec {
            image: name.clone(),
            name,
            network: Some(network_name.to_string()),
            ports: vec![
                PortMapping::tcp(self.config.metadata_port, METADATA_CONTAINER_PORT),
                PortMapping::tcp(self.config.migration_port, MIGRATION_CONTAINER_PORT),
            ],
            env: self.metadata_env(database_address),
            interactive: true,
        };
        self.gateway.run_container(&spec).await
    }

    async fn start_ui_service(
        &self,
        checkout: &Path,
        network_name: &str,
        database_address: &str,
    ) -> Result<ContainerHandle> {
        let name = self.naming.name_for(Role::UiService);
        self.build_from_checkout(checkout, UI_SERVICE_DOCKERFILE, &name).await?;

        let mut env = self.metadata_env(database_address);
        env.extend(self.credential_env());

        let spec = RunSpec {
            image: name.clone(),
            name,
            network: Some(network_name.to_string()),
            ports: vec![PortMapping::tcp(self.config.ui_service_port, UI_SERVICE_CONTAINER_PORT)],
            env,
            interactive: true,
        };
        self.gateway.run_container(&spec).await
    }

    async fn start_ui(&self, checkout: &Path, network_name: &str) -> Result<ContainerHandle> {
        let name = self.naming.name_for(Role::Ui);
        self.build_from_checkout(checkout, UI_DOCKERFILE, &name).await?;

        let spec = RunSpec {
            image: name.clone(),
            name,
            network: Some(network_name.to_string()),
            ports: vec![PortMapping::tcp(self.config.ui_port, UI_CONTAINER_PORT)],
            env: vec![(
                "METAFLOW_SERVICE".to_string(),
                format!("http://localhost:{}", self.config.ui_service_port),
            )],
            interactive: true,
        };
        self.gateway.run_container(&spec).await
    }

    /// Clone a repository at a tag into a fresh temporary directory. The
    /// directory lives until the handle drops, which is after the image
    /// build that consumes it.
    async fn checkout(&self, repo: &str, tag: &str, prefix: &str) -> Result<TempDir> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir().map_err(|e| {
            DeployError::Io { path: std::env::temp_dir(), source: e }
        })?;

        let spec = CheckoutSpec { repo: repo.to_string(), tag: tag.to_string() };
        self.fetcher.fetch(&spec, dir.path()).await?;
        Ok(dir)
    }

    async fn build_from_checkout(
        &self,
        checkout: &Path,
        dockerfile: &str,
        tag: &str,
    ) -> Result<()> {
        let spec = BuildSpec {
            context_dir: checkout.to_path_buf(),
            dockerfile: dockerfile.to_string(),
            tag: tag.to_string(),
        };
        self.gateway.build_image(&spec).await
    }

    /// The runtime finishes wiring a new network shortly after create
    /// returns. Wait until it is visible, up to the settle budget, then
    /// proceed either way.
    async fn await_network_visible(&self, network_name: &str) -> Result<()> {
        for _ in 0..self.config.network_settle_secs {
            match self.gateway.find_network(network_name).await {
                Ok(_) => return Ok(()),
                Err(DeployError::NetworkNotFound { .. }) => sleep(SETTLE_INTERVAL).await,
                Err(err) => return Err(err),
            }
        }
        debug!(network = %network_name, "Network not visible within settle budget");
        Ok(())
    }

    async fn await_container_running(
        &self,
        container: &ContainerHandle,
        budget_secs: u64,
    ) -> Result<()> {
        for _ in 0..budget_secs {
            let fresh = self.gateway.refresh_container(container).await?;
            if fresh.status == ContainerStatus::Running {
                return Ok(());
            }
            debug!(container = %fresh.name, status = %fresh.status, "Waiting for container");
            sleep(SETTLE_INTERVAL).await;
        }
        debug!(container = %container.name, "Container not running within settle budget");
        Ok(())
    }

    /// Endpoint detach lags container removal. Wait until the runtime
    /// stops listing attachments, up to the drain budget, then remove
    /// regardless.
    async fn await_network_drained(&self, network_name: &str) -> Result<()> {
        for _ in 0..self.config.network_drain_secs {
            let network = self.gateway.find_network(network_name).await?;
            if network.attached.is_empty() {
                return Ok(());
            }
            sleep(SETTLE_INTERVAL).await;
        }
        debug!(network = %network_name, "Network still reports attachments after drain budget");
        Ok(())
    }

    fn database_env(&self) -> Vec<(String, String)> {
        vec![
            ("POSTGRES_USER".to_string(), self.config.database_user.clone()),
            ("POSTGRES_PASSWORD".to_string(), self.config.database_password.clone()),
            ("POSTGRES_DB".to_string(), self.config.database_name.clone()),
        ]
    }

    fn metadata_env(&self, database_address: &str) -> Vec<(String, String)> {
        vec![
            ("MF_METADATA_DB_HOST".to_string(), database_address.to_string()),
            ("MF_METADATA_DB_PORT".to_string(), self.config.database_port.to_string()),
            ("MF_METADATA_DB_USER".to_string(), self.config.database_user.clone()),
            ("MF_METADATA_DB_PSWD".to_string(), self.config.database_password.clone()),
            ("MF_METADATA_DB_NAME".to_string(), self.config.database_name.clone()),
        ]
    }

    /// Credentials for the UI backend come from the operator's own
    /// environment. Only allow-listed variables are forwarded.
    fn credential_env(&self) -> Vec<(String, String)> {
        self.config
            .credential_env_passthrough
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
            .collect()
    }
}
