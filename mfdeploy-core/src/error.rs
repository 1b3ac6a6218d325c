//! Error types for mfdeploy.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mfdeploy operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Main error type for mfdeploy.
#[derive(Error, Debug)]
pub enum DeployError {
    // Deployment state errors
    #[error("Deployment already exists with resources: {}. Run the teardown command before creating a new one", .resources.join(", "))]
    ExistingDeployment { resources: Vec<String> },

    #[error("Cannot resolve the address of container {container_name} ({container_id})")]
    IpNotResolved { container_name: String, container_id: String },

    #[error("Network not found: {network_name}")]
    NetworkNotFound { network_name: String },

    // Runtime errors
    #[error("Container runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("docker {operation} failed: {reason}")]
    RuntimeCommand { operation: String, reason: String },

    #[error("Unreadable runtime attributes for {subject}: {reason}")]
    InvalidAttributes { subject: String, reason: String },

    // Source errors
    #[error("Failed to fetch {repo} at {tag}: {reason}")]
    FetchFailed { repo: String, tag: String, reason: String },

    // Build errors
    #[error("Failed to build image {image}: {reason}")]
    BuildFailed { image: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Headline shown above the detailed message for user-facing failures.
    ///
    /// Only the modeled deployment errors carry one; everything else renders
    /// through its error chain alone.
    pub fn headline(&self) -> Option<&'static str> {
        match self {
            Self::ExistingDeployment { .. } => Some("A deployment already exists"),
            Self::IpNotResolved { .. } => Some("Container address unresolvable"),
            Self::NetworkNotFound { .. } => Some("Cannot find network"),
            _ => None,
        }
    }
}
