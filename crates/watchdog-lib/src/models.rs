//! Core data models for the watchdog

use serde::{Deserialize, Serialize};

/// Observed run state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
    Unknown,
}

/// Health probe result reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    /// Probe configured but still inside its start period
    Starting,
    /// No health probe configured for the container
    None,
}

/// Whether the watchdog may restart a service on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    Auto,
    Manual,
}

/// A container-lifecycle unit as seen in one health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedService {
    pub name: String,
    pub run_state: RunState,
    pub health: HealthState,
    pub restart_policy: RestartPolicy,
}

impl ManagedService {
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn is_unhealthy(&self) -> bool {
        self.health == HealthState::Unhealthy
    }
}

/// Battery state from the fuel gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// State of charge, 0-100
    pub percent: u8,
    pub charging: bool,
}

/// Environmental snapshot for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressReading {
    /// CPU temperature in Celsius; zero or negative means unknown
    pub cpu_temp_c: f64,
    /// `None` when no battery is present or the gauge did not report
    pub battery: Option<BatteryReading>,
}

impl StressReading {
    /// Reading used when the hardware monitor could not be queried
    pub fn no_data() -> Self {
        Self {
            cpu_temp_c: 0.0,
            battery: None,
        }
    }

    /// CPU temperature, if the sensor produced a usable value
    pub fn cpu_temp(&self) -> Option<f64> {
        (self.cpu_temp_c.is_finite() && self.cpu_temp_c > 0.0).then_some(self.cpu_temp_c)
    }

    pub fn has_data(&self) -> bool {
        self.cpu_temp().is_some() || self.battery.is_some()
    }
}

impl Default for StressReading {
    fn default() -> Self {
        Self::no_data()
    }
}
