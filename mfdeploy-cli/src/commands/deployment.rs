//! The create / teardown / check commands.

use crate::output;
use anyhow::{Context, Result};
use mfdeploy_core::{
    CheckReport, DeploymentConfig, DeploymentState, DockerCli, GitFetcher, Orchestrator,
    TeardownOutcome,
};
use std::sync::Arc;

pub async fn create(config: DeploymentConfig) -> Result<()> {
    let orchestrator = connect(config.clone()).await?;

    output::step("Creating the Metaflow deployment. The first run clones and builds the service images, which takes a while");
    orchestrator.create().await?;

    output::success(&format!(
        "Deployment created! The UI is served at http://localhost:{} and the metadata service at http://localhost:{}",
        config.ui_port, config.metadata_port
    ));
    Ok(())
}

pub async fn teardown() -> Result<()> {
    let orchestrator = connect(DeploymentConfig::default()).await?;

    output::step("Tearing down the Metaflow deployment");
    match orchestrator.teardown().await? {
        TeardownOutcome::Removed { resources } => {
            output::success(&format!("Removed {}", resources.join(", ")));
        }
        TeardownOutcome::NoDeployment => {
            output::warning(
                "No containers found for deployment. Run `mfdeploy create` to create a new deployment",
            );
        }
    }
    Ok(())
}

pub async fn check() -> Result<()> {
    let orchestrator = connect(DeploymentConfig::default()).await?;
    let report = orchestrator.check().await?;

    let line = check_line(&report);
    match report.state {
        DeploymentState::Complete => output::success(&line),
        DeploymentState::Partial => output::warning(&line),
        DeploymentState::NoDeployment => output::step(&line),
    }
    Ok(())
}

async fn connect(config: DeploymentConfig) -> Result<Orchestrator> {
    let gateway = DockerCli::connect().await.context("is the Docker daemon running?")?;
    Ok(Orchestrator::new(Arc::new(gateway), Arc::new(GitFetcher::new()), config)?)
}

fn check_line(report: &CheckReport) -> String {
    match report.state {
        DeploymentState::NoDeployment => {
            "No deployment found. Run `mfdeploy create` to provision one".to_string()
        }
        DeploymentState::Partial => format!(
            "Deployment is incomplete; found only: {}. Run `mfdeploy teardown` to clean up",
            report.present.join(", ")
        ),
        DeploymentState::Complete => {
            format!("Deployment is up: {}", report.present.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_line_names_what_exists() {
        let report = CheckReport {
            state: DeploymentState::Partial,
            present: vec!["mfdeploy-postgres".to_string(), "mfdeploy-ui".to_string()],
        };
        let line = check_line(&report);
        assert!(line.contains("mfdeploy-postgres, mfdeploy-ui"));
        assert!(line.contains("teardown"));
    }

    #[test]
    fn check_line_points_an_empty_runtime_at_create() {
        let report = CheckReport { state: DeploymentState::NoDeployment, present: vec![] };
        assert!(check_line(&report).contains("mfdeploy create"));
    }
}
