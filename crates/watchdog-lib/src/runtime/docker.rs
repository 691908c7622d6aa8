//! Docker Engine implementation of [`ContainerRuntime`]

use super::{async_trait, ContainerRuntime};
use crate::error::{RuntimeError, RuntimeResult};
use crate::models::{HealthState, ManagedService, RestartPolicy, RunState};
use bollard::models::{ContainerInspectResponse, HealthStatusEnum, RestartPolicyNameEnum};
use bollard::query_parameters::{
    InspectContainerOptionsBuilder, ListContainersOptionsBuilder, RestartContainerOptionsBuilder,
    StartContainerOptionsBuilder, StopContainerOptionsBuilder,
};
use bollard::Docker;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single Docker API call
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Container runtime backed by the local Docker daemon
pub struct DockerRuntime {
    docker: Docker,
    api_timeout: Duration,
}

impl DockerRuntime {
    /// Connect using the default local socket
    pub fn connect(api_timeout: Duration) -> RuntimeResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker, api_timeout))
    }

    pub fn new(docker: Docker, api_timeout: Duration) -> Self {
        Self {
            docker,
            api_timeout,
        }
    }

    /// Run a Docker call under a deadline, classifying its failure
    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        name: &str,
        timeout: Duration,
        call: F,
    ) -> RuntimeResult<T>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(name, e)),
            Err(_) => Err(RuntimeError::Timeout {
                operation,
                name: name.to_string(),
                timeout,
            }),
        }
    }

    /// Bound for calls that wait out a graceful stop
    fn stop_bound(&self, timeout_secs: u32) -> Duration {
        let grace = grace_period_secs(timeout_secs).unsigned_abs();
        self.api_timeout + Duration::from_secs(u64::from(grace))
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<ManagedService> {
        let options = InspectContainerOptionsBuilder::new().build();
        let info = self
            .bounded(
                "inspect",
                name,
                self.api_timeout,
                self.docker.inspect_container(name, Some(options)),
            )
            .await?;
        Ok(service_from_inspect(name, &info))
    }
}

/// Grace period as the signed seconds the Engine API takes
fn grace_period_secs(timeout_secs: u32) -> i32 {
    i32::try_from(timeout_secs).unwrap_or(i32::MAX)
}

/// Map a Docker error onto the runtime taxonomy
fn classify(name: &str, err: bollard::errors::Error) -> RuntimeError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(name.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        } => RuntimeError::NotModified(name.to_string()),
        other => RuntimeError::Docker(other),
    }
}

/// Build a [`ManagedService`] from `docker inspect` output
pub fn service_from_inspect(name: &str, info: &ContainerInspectResponse) -> ManagedService {
    let run_state = match info.state.as_ref().and_then(|s| s.running) {
        Some(true) => RunState::Running,
        Some(false) => RunState::Stopped,
        None => RunState::Unknown,
    };

    let health = match info
        .state
        .as_ref()
        .and_then(|s| s.health.as_ref())
        .and_then(|h| h.status.as_ref())
    {
        Some(HealthStatusEnum::HEALTHY) => HealthState::Healthy,
        Some(HealthStatusEnum::UNHEALTHY) => HealthState::Unhealthy,
        Some(HealthStatusEnum::STARTING) => HealthState::Starting,
        _ => HealthState::None,
    };

    let restart_policy = match info
        .host_config
        .as_ref()
        .and_then(|h| h.restart_policy.as_ref())
        .and_then(|p| p.name.as_ref())
    {
        Some(RestartPolicyNameEnum::NO) => RestartPolicy::Manual,
        _ => RestartPolicy::Auto,
    };

    ManagedService {
        name: name.to_string(),
        run_state,
        health,
        restart_policy,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, include_stopped: bool) -> RuntimeResult<Vec<ManagedService>> {
        let options = ListContainersOptionsBuilder::new()
            .all(include_stopped)
            .build();
        let summaries = self
            .bounded(
                "list",
                "*",
                self.api_timeout,
                self.docker.list_containers(Some(options)),
            )
            .await?;

        let mut services = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(name) = summary
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
            else {
                debug!(id = ?summary.id, "Skipping container without a name");
                continue;
            };

            match self.inspect(&name).await {
                Ok(service) => services.push(service),
                Err(e) => {
                    warn!(service = %name, error = %e, "Failed to inspect container, omitting from snapshot");
                }
            }
        }

        Ok(services)
    }

    async fn restart(&self, name: &str, timeout_secs: u32) -> RuntimeResult<()> {
        let options = RestartContainerOptionsBuilder::new()
            .t(grace_period_secs(timeout_secs))
            .build();
        self.bounded(
            "restart",
            name,
            self.stop_bound(timeout_secs),
            self.docker.restart_container(name, Some(options)),
        )
        .await
    }

    async fn stop(&self, name: &str, timeout_secs: u32) -> RuntimeResult<()> {
        let options = StopContainerOptionsBuilder::new()
            .t(grace_period_secs(timeout_secs))
            .build();
        self.bounded(
            "stop",
            name,
            self.stop_bound(timeout_secs),
            self.docker.stop_container(name, Some(options)),
        )
        .await
    }

    async fn start(&self, name: &str) -> RuntimeResult<()> {
        let options = StartContainerOptionsBuilder::new().build();
        self.bounded(
            "start",
            name,
            self.api_timeout,
            self.docker.start_container(name, Some(options)),
        )
        .await
    }
}
