//! Watchdog configuration
//!
//! Typed, validated settings for the reconciler. The binary builds this from
//! the process environment; tests build it directly.

use crate::catalog::{Category, ServiceCatalog};
use crate::error::ConfigError;
use crate::governor::{DEFAULT_COOLDOWN, DEFAULT_MAX_ATTEMPTS};
use crate::runtime::DEFAULT_API_TIMEOUT;
use crate::shedding::{BatteryPolicy, ThermalPolicy};
use crate::stress::DEFAULT_SENSOR_TIMEOUT;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// How often restart counters are cleared
pub const COUNTER_RESET_INTERVAL: Duration = Duration::from_secs(3600);

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SERVICE_NAME_PREFIX: &str = "mulecube-";

pub const DEFAULT_HW_MONITOR_URL: &str = "http://mulecube-hw-monitor:8080";

pub const DEFAULT_THERMAL_SHED_TEMP_C: f64 = 80.0;

pub const DEFAULT_BATTERY_SHED_PERCENT: u8 = 15;

pub const DEFAULT_CRITICAL_SERVICES: &[&str] = &["kiwix", "tileserver", "nginx", "dnsmasq"];

pub const DEFAULT_THERMAL_SHED_SERVICES: &[&str] = &["ollama", "retroarch", "navidrome"];

pub const DEFAULT_BATTERY_SHED_SERVICES: &[&str] =
    &["ollama", "retroarch", "navidrome", "openwebui"];

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    /// Sleep between the end of one tick and the start of the next
    pub tick_interval: Duration,
    pub max_restart_attempts: u32,
    pub restart_cooldown: Duration,
    pub counter_reset_interval: Duration,
    pub critical_services: Vec<String>,
    pub thermal_shed_services: Vec<String>,
    pub battery_shed_services: Vec<String>,
    /// Prefix the runtime puts in front of configured service names
    pub service_name_prefix: String,
    pub thermal: ThermalPolicy,
    pub battery: BatteryPolicy,
    /// Grace period handed to the runtime on restart and stop
    pub container_stop_timeout: Duration,
    pub docker_api_timeout: Duration,
    pub hw_monitor_url: String,
    pub sensor_timeout: Duration,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_restart_attempts: DEFAULT_MAX_ATTEMPTS,
            restart_cooldown: DEFAULT_COOLDOWN,
            counter_reset_interval: COUNTER_RESET_INTERVAL,
            critical_services: owned(DEFAULT_CRITICAL_SERVICES),
            thermal_shed_services: owned(DEFAULT_THERMAL_SHED_SERVICES),
            battery_shed_services: owned(DEFAULT_BATTERY_SHED_SERVICES),
            service_name_prefix: DEFAULT_SERVICE_NAME_PREFIX.to_string(),
            thermal: ThermalPolicy::new(DEFAULT_THERMAL_SHED_TEMP_C),
            battery: BatteryPolicy::new(DEFAULT_BATTERY_SHED_PERCENT),
            container_stop_timeout: DEFAULT_STOP_TIMEOUT,
            docker_api_timeout: DEFAULT_API_TIMEOUT,
            hw_monitor_url: DEFAULT_HW_MONITOR_URL.to_string(),
            sensor_timeout: DEFAULT_SENSOR_TIMEOUT,
        }
    }
}

impl WatchdogConfig {
    /// Check invariants, returning the config unchanged when it is usable
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "tick_interval",
                value: format!("{:?}", self.tick_interval),
                reason: "must be greater than zero",
            });
        }

        if !self.thermal.threshold_c.is_finite() || self.thermal.threshold_c <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "thermal_shed_temp_c",
                value: self.thermal.threshold_c.to_string(),
                reason: "must be a positive temperature",
            });
        }

        if self.battery.threshold_percent > 100 {
            return Err(ConfigError::Invalid {
                field: "battery_shed_percent",
                value: self.battery.threshold_percent.to_string(),
                reason: "must be between 0 and 100",
            });
        }

        match Url::parse(&self.hw_monitor_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => {
                return Err(ConfigError::Invalid {
                    field: "hw_monitor_url",
                    value: self.hw_monitor_url.clone(),
                    reason: "must be an absolute http(s) URL",
                })
            }
        }

        Ok(self)
    }

    /// Resolve the configured name lists into a category catalog
    pub fn catalog(&self) -> ServiceCatalog {
        ServiceCatalog::new(self.service_name_prefix.as_str())
            .with_category(Category::Critical, &self.critical_services)
            .with_category(Category::ThermalShed, &self.thermal_shed_services)
            .with_category(Category::BatteryShed, &self.battery_shed_services)
    }

    /// Grace period in the whole seconds the runtime API expects
    pub fn stop_timeout_secs(&self) -> u32 {
        u32::try_from(self.container_stop_timeout.as_secs()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchdogConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(30));
        assert_eq!(config.max_restart_attempts, 3);
        assert_eq!(config.restart_cooldown, Duration::from_secs(300));
        assert_eq!(config.counter_reset_interval, Duration::from_secs(3600));
        assert_eq!(config.thermal.threshold_c, 80.0);
        assert_eq!(config.thermal.hysteresis_c, 5.0);
        assert_eq!(config.battery.threshold_percent, 15);
        assert_eq!(config.battery.hysteresis_percent, 5);
        assert_eq!(config.hw_monitor_url, "http://mulecube-hw-monitor:8080");
        assert_eq!(config.stop_timeout_secs(), 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let config = WatchdogConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_interval"));
    }

    #[test]
    fn test_battery_threshold_over_100_rejected() {
        let config = WatchdogConfig {
            battery: BatteryPolicy::new(101),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_thermal_threshold_rejected() {
        let config = WatchdogConfig {
            thermal: ThermalPolicy::new(0.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sensor_url_must_be_http() {
        for bad in ["mulecube-hw-monitor:8080", "ftp://host/", "not a url"] {
            let config = WatchdogConfig {
                hw_monitor_url: bad.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_catalog_from_defaults() {
        let catalog = WatchdogConfig::default().catalog();
        assert!(catalog.has("mulecube-kiwix", Category::Critical));
        assert!(catalog.has("mulecube-ollama", Category::ThermalShed));
        assert!(catalog.has("mulecube-ollama", Category::BatteryShed));
        assert!(catalog.has("mulecube-openwebui", Category::BatteryShed));
        assert!(!catalog.has("mulecube-openwebui", Category::ThermalShed));
        assert!(!catalog.has("mulecube-hw-monitor", Category::Critical));
    }
}
