//! mfdeploy-core: local Metaflow deployment engine.
//!
//! Provisions a self-contained Metaflow deployment on a local container
//! runtime: a Postgres database, the metadata service, the UI backend,
//! and the UI frontend, joined by a private bridge network. The same
//! engine tears a deployment down and reports its status.
//!
//! The runtime is reached through the [`runtime::RuntimeGateway`] trait;
//! [`runtime::DockerCli`] is the shipped implementation. Service sources
//! are fetched through [`fetch::SourceFetcher`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod orchestrator;
pub mod resolver;
pub mod runtime;

pub use config::DeploymentConfig;
pub use discovery::{DeploymentSnapshot, DeploymentState};
pub use error::{DeployError, Result};
pub use fetch::{CheckoutSpec, GitFetcher, SourceFetcher};
pub use naming::{Naming, Role};
pub use orchestrator::{CheckReport, Orchestrator, TeardownOutcome};
pub use runtime::{
    BuildSpec, ContainerHandle, ContainerStatus, DockerCli, NetworkHandle, PortMapping, Protocol,
    RunSpec, RuntimeGateway,
};
