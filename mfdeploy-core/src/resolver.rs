//! Container address resolution.
//!
//! The runtime assigns a container its address on the private network
//! asynchronously after start. Downstream containers need that address in
//! their environment, so provisioning blocks here until it appears.

use crate::error::{DeployError, Result};
use crate::runtime::{ContainerHandle, RuntimeGateway};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll the runtime until the container reports an address on the named
/// network, re-reading its state once per attempt. Fails after
/// `max_attempts` reads without an address.
#[instrument(skip(gateway, container), fields(container_name = %container.name))]
pub async fn resolve_address(
    gateway: &dyn RuntimeGateway,
    container: &ContainerHandle,
    network_name: &str,
    max_attempts: u32,
) -> Result<String> {
    for attempt in 1..=max_attempts {
        let fresh = gateway.refresh_container(container).await?;

        if let Some(address) = fresh.address_on(network_name) {
            debug!(attempt, address, "Container address resolved");
            return Ok(address.to_string());
        }

        debug!(attempt, max_attempts, status = %fresh.status, "No address on network yet");
        sleep(POLL_INTERVAL).await;
    }

    Err(DeployError::IpNotResolved {
        container_name: container.name.clone(),
        container_id: container.id.clone(),
    })
}
