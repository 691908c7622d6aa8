//! Container runtime access
//!
//! The watchdog only needs a narrow slice of the runtime: list containers
//! with their state, and restart, stop or start one by name. Everything goes
//! through [`ContainerRuntime`] so the decision logic can be exercised
//! without a Docker daemon.

mod docker;
#[cfg(test)]
pub(crate) mod mock;

pub use docker::{service_from_inspect, DockerRuntime, DEFAULT_API_TIMEOUT};

use crate::error::RuntimeResult;
use crate::models::ManagedService;

pub use async_trait::async_trait;

/// Trait for container runtime implementations
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List managed containers; stopped ones are included when asked
    async fn list_containers(&self, include_stopped: bool) -> RuntimeResult<Vec<ManagedService>>;

    /// Restart a container, giving it `timeout_secs` to stop gracefully
    async fn restart(&self, name: &str, timeout_secs: u32) -> RuntimeResult<()>;

    /// Stop a container, giving it `timeout_secs` to stop gracefully
    async fn stop(&self, name: &str, timeout_secs: u32) -> RuntimeResult<()>;

    /// Start a stopped container
    async fn start(&self, name: &str) -> RuntimeResult<()>;
}
