//! In-memory runtime for unit tests

use super::{async_trait, ContainerRuntime};
use crate::error::{RuntimeError, RuntimeResult};
use crate::models::{HealthState, ManagedService, RestartPolicy, RunState};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// A lifecycle call received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Restart(String),
    Stop(String),
    Start(String),
}

/// Runtime that keeps container state in memory and records every action
#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<BTreeMap<String, ManagedService>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    list_fails: Mutex<bool>,
}

pub fn service(name: &str, run_state: RunState, health: HealthState) -> ManagedService {
    ManagedService {
        name: name.to_string(),
        run_state,
        health,
        restart_policy: RestartPolicy::Auto,
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, service: ManagedService) -> Self {
        self.insert(service);
        self
    }

    pub fn insert(&self, service: ManagedService) {
        self.containers
            .lock()
            .unwrap()
            .insert(service.name.clone(), service);
    }

    pub fn remove(&self, name: &str) {
        self.containers.lock().unwrap().remove(name);
    }

    pub fn set_health(&self, name: &str, health: HealthState) {
        if let Some(s) = self.containers.lock().unwrap().get_mut(name) {
            s.health = health;
        }
    }

    pub fn set_run_state(&self, name: &str, run_state: RunState) {
        if let Some(s) = self.containers.lock().unwrap().get_mut(name) {
            s.run_state = run_state;
        }
    }

    pub fn run_state(&self, name: &str) -> Option<RunState> {
        self.containers.lock().unwrap().get(name).map(|s| s.run_state)
    }

    /// Make every lifecycle call for `name` fail with a generic error
    pub fn fail_actions_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn heal_actions_for(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.list_fails.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn check_failing(&self, name: &str) -> RuntimeResult<()> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(RuntimeError::Other(format!("injected failure for {name}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_containers(&self, include_stopped: bool) -> RuntimeResult<Vec<ManagedService>> {
        if *self.list_fails.lock().unwrap() {
            return Err(RuntimeError::Other("daemon unreachable".to_string()));
        }
        Ok(self
            .containers
            .lock()
            .unwrap()
            .values()
            .filter(|s| include_stopped || s.is_running())
            .cloned()
            .collect())
    }

    async fn restart(&self, name: &str, _timeout_secs: u32) -> RuntimeResult<()> {
        self.calls.lock().unwrap().push(Call::Restart(name.to_string()));
        self.check_failing(name)?;
        let mut containers = self.containers.lock().unwrap();
        let service = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        service.run_state = RunState::Running;
        Ok(())
    }

    async fn stop(&self, name: &str, _timeout_secs: u32) -> RuntimeResult<()> {
        self.calls.lock().unwrap().push(Call::Stop(name.to_string()));
        self.check_failing(name)?;
        let mut containers = self.containers.lock().unwrap();
        let service = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if !service.is_running() {
            return Err(RuntimeError::NotModified(name.to_string()));
        }
        service.run_state = RunState::Stopped;
        Ok(())
    }

    async fn start(&self, name: &str) -> RuntimeResult<()> {
        self.calls.lock().unwrap().push(Call::Start(name.to_string()));
        self.check_failing(name)?;
        let mut containers = self.containers.lock().unwrap();
        let service = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if service.is_running() {
            return Err(RuntimeError::NotModified(name.to_string()));
        }
        service.run_state = RunState::Running;
        Ok(())
    }
}
