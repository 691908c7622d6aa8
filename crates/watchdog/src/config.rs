//! Watchdog configuration from the process environment

use anyhow::{Context, Result};
use config::{Config, Environment, Map};
use serde::Deserialize;
use std::time::Duration;
use watchdog_lib::config as defaults;
use watchdog_lib::error::ConfigError;
use watchdog_lib::shedding::{BatteryPolicy, ThermalPolicy};
use watchdog_lib::WatchdogConfig;

const LIST_KEYS: &[&str] = &[
    "critical_services",
    "thermal_shed_services",
    "battery_shed_services",
];

/// Environment-level settings, one field per variable
#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    /// Identifier attached to every log event
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,

    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown_seconds: u64,

    #[serde(default = "default_critical_services")]
    pub critical_services: Vec<String>,

    #[serde(default = "default_thermal_shed_services")]
    pub thermal_shed_services: Vec<String>,

    #[serde(default = "default_thermal_shed_temp")]
    pub thermal_shed_temp_c: f64,

    #[serde(default = "default_battery_shed_services")]
    pub battery_shed_services: Vec<String>,

    #[serde(default = "default_battery_shed_percent")]
    pub battery_shed_percent: u8,

    /// Hardware monitor base URL
    #[serde(default = "default_hw_monitor_url")]
    pub hw_monitor_url: String,

    #[serde(default = "default_service_name_prefix")]
    pub service_name_prefix: String,

    /// Grace period for container restart and stop
    #[serde(default = "default_stop_timeout")]
    pub container_stop_timeout_seconds: u64,

    #[serde(default = "default_docker_api_timeout")]
    pub docker_api_timeout_seconds: u64,

    #[serde(default = "default_sensor_timeout")]
    pub sensor_timeout_seconds: u64,
}

fn default_device_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "mulecube".to_string())
}

fn default_check_interval() -> u64 {
    defaults::DEFAULT_TICK_INTERVAL.as_secs()
}

fn default_max_restart_attempts() -> u32 {
    watchdog_lib::governor::DEFAULT_MAX_ATTEMPTS
}

fn default_restart_cooldown() -> u64 {
    watchdog_lib::governor::DEFAULT_COOLDOWN.as_secs()
}

fn default_critical_services() -> Vec<String> {
    owned(defaults::DEFAULT_CRITICAL_SERVICES)
}

fn default_thermal_shed_services() -> Vec<String> {
    owned(defaults::DEFAULT_THERMAL_SHED_SERVICES)
}

fn default_thermal_shed_temp() -> f64 {
    defaults::DEFAULT_THERMAL_SHED_TEMP_C
}

fn default_battery_shed_services() -> Vec<String> {
    owned(defaults::DEFAULT_BATTERY_SHED_SERVICES)
}

fn default_battery_shed_percent() -> u8 {
    defaults::DEFAULT_BATTERY_SHED_PERCENT
}

fn default_hw_monitor_url() -> String {
    defaults::DEFAULT_HW_MONITOR_URL.to_string()
}

fn default_service_name_prefix() -> String {
    defaults::DEFAULT_SERVICE_NAME_PREFIX.to_string()
}

fn default_stop_timeout() -> u64 {
    defaults::DEFAULT_STOP_TIMEOUT.as_secs()
}

fn default_docker_api_timeout() -> u64 {
    watchdog_lib::runtime::DEFAULT_API_TIMEOUT.as_secs()
}

fn default_sensor_timeout() -> u64 {
    watchdog_lib::stress::DEFAULT_SENSOR_TIMEOUT.as_secs()
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn environment() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::default().try_parsing(true).list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(environment())
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: Map<String, String>) -> Result<Self> {
        Self::from_environment(environment().source(Some(vars)))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read environment")?;

        config
            .try_deserialize()
            .context("Invalid watchdog configuration")
    }

    /// Convert into the validated library configuration
    pub fn into_watchdog_config(self) -> Result<WatchdogConfig, ConfigError> {
        WatchdogConfig {
            tick_interval: Duration::from_secs(self.check_interval_seconds),
            max_restart_attempts: self.max_restart_attempts,
            restart_cooldown: Duration::from_secs(self.restart_cooldown_seconds),
            counter_reset_interval: defaults::COUNTER_RESET_INTERVAL,
            critical_services: self.critical_services,
            thermal_shed_services: self.thermal_shed_services,
            battery_shed_services: self.battery_shed_services,
            service_name_prefix: self.service_name_prefix,
            thermal: ThermalPolicy::new(self.thermal_shed_temp_c),
            battery: BatteryPolicy::new(self.battery_shed_percent),
            container_stop_timeout: Duration::from_secs(self.container_stop_timeout_seconds),
            docker_api_timeout: Duration::from_secs(self.docker_api_timeout_seconds),
            hw_monitor_url: self.hw_monitor_url,
            sensor_timeout: Duration::from_secs(self.sensor_timeout_seconds),
        }
        .validate()
    }
}
