//! Health probing
//!
//! Takes a read-only snapshot of every managed container. A runtime that
//! cannot be reached yields an empty snapshot rather than an error; the
//! tick carries on with whatever else it can do.

use crate::models::ManagedService;
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct HealthProber {
    runtime: Arc<dyn ContainerRuntime>,
}

impl HealthProber {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Snapshot every container, stopped ones included
    pub async fn probe(&self) -> Vec<ManagedService> {
        match self.runtime.list_containers(true).await {
            Ok(services) => {
                debug!(containers = services.len(), "Health snapshot taken");
                services
            }
            Err(e) => {
                warn!(error = %e, "Failed to list containers, continuing with empty snapshot");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthState, RunState};
    use crate::runtime::mock::{service, MockRuntime};

    #[tokio::test]
    async fn test_probe_includes_stopped_containers() {
        let runtime = Arc::new(
            MockRuntime::new()
                .with(service("mulecube-kiwix", RunState::Running, HealthState::Healthy))
                .with(service("mulecube-nginx", RunState::Stopped, HealthState::None)),
        );
        let prober = HealthProber::new(runtime);

        let snapshot = prober.probe().await;

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot
            .iter()
            .any(|s| s.name == "mulecube-nginx" && s.run_state == RunState::Stopped));
    }

    #[tokio::test]
    async fn test_probe_failure_yields_empty_snapshot() {
        let runtime = Arc::new(
            MockRuntime::new().with(service("mulecube-kiwix", RunState::Running, HealthState::Healthy)),
        );
        runtime.fail_listing(true);
        let prober = HealthProber::new(runtime);

        assert!(prober.probe().await.is_empty());
    }
}
