//! Source checkouts for the service images.
//!
//! The metadata service and UI images are built from shallow clones of
//! their upstream repositories at a pinned tag.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// A repository and the tag or branch to check out from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSpec {
    /// Clone URL of the repository.
    pub repo: String,

    /// Tag or branch to check out.
    pub tag: String,
}

/// Fetches a source tree into a local directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Materialize the checkout under `dest`, which must be an existing
    /// empty directory.
    async fn fetch(&self, spec: &CheckoutSpec, dest: &Path) -> Result<()>;
}

/// Git-backed fetcher shelling out to the local `git` binary.
pub struct GitFetcher {
    binary_path: PathBuf,
}

impl GitFetcher {
    pub fn new() -> Self {
        Self { binary_path: Self::find_binary() }
    }

    fn find_binary() -> PathBuf {
        let candidates = [
            PathBuf::from("/usr/local/bin/git"),
            PathBuf::from("/usr/bin/git"),
            PathBuf::from("/opt/homebrew/bin/git"),
        ];

        for path in candidates {
            if path.exists() {
                return path;
            }
        }

        PathBuf::from("git")
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, spec: &CheckoutSpec, dest: &Path) -> Result<()> {
        info!(repo = %spec.repo, tag = %spec.tag, "Cloning repository");

        let output = Command::new(&self.binary_path)
            .args(clone_args(spec, dest))
            .output()
            .await
            .map_err(|e| DeployError::FetchFailed {
                repo: spec.repo.clone(),
                tag: spec.tag.clone(),
                reason: format!("failed to spawn git: {}", e),
            })?;

        if !output.status.success() {
            return Err(DeployError::FetchFailed {
                repo: spec.repo.clone(),
                tag: spec.tag.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(dest = %dest.display(), "Checkout ready");
        Ok(())
    }
}

/// Shallow single-branch clone keeps the checkout small; only the tree at
/// the tag is needed for the image build.
fn clone_args(spec: &CheckoutSpec, dest: &Path) -> Vec<String> {
    vec![
        "clone".to_string(),
        "--depth".to_string(),
        "1".to_string(),
        "--branch".to_string(),
        spec.tag.clone(),
        spec.repo.clone(),
        dest.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_args_pin_the_tag_and_shallow_depth() {
        let spec = CheckoutSpec {
            repo: "https://github.com/Netflix/metaflow-service".to_string(),
            tag: "2.1.0".to_string(),
        };

        assert_eq!(
            clone_args(&spec, Path::new("/tmp/mfdeploy-metadata")),
            vec![
                "clone",
                "--depth",
                "1",
                "--branch",
                "2.1.0",
                "https://github.com/Netflix/metaflow-service",
                "/tmp/mfdeploy-metadata",
            ]
        );
    }
}
