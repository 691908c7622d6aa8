//! Environmental stress readings
//!
//! Polls the hardware monitor for CPU temperature and battery state. Any
//! failure (unreachable endpoint, non-2xx status, malformed body) turns into
//! a "no data" reading so the shedding logic holds its current state.

use crate::models::{BatteryReading, StressReading};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Path of the combined status endpoint on the hardware monitor
pub const SYSTEM_STATUS_PATH: &str = "api/system";

/// Default bound on one sensor request
pub const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of stress readings
#[async_trait]
pub trait StressSource: Send + Sync {
    /// Current reading; never fails, degrades to [`StressReading::no_data`]
    async fn read(&self) -> StressReading;
}

/// `GET /api/system` response body, reduced to what the watchdog reads
#[derive(Debug, Default, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub temperature: Option<TemperatureStatus>,
    #[serde(default)]
    pub battery: Option<BatteryStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemperatureStatus {
    #[serde(default)]
    pub cpu_temp_c: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatteryStatus {
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub charging: Option<bool>,
}

impl SystemStatus {
    /// Convert to a reading, treating absent or unavailable batteries as none
    pub fn into_reading(self) -> StressReading {
        let cpu_temp_c = self
            .temperature
            .and_then(|t| t.cpu_temp_c)
            .unwrap_or(0.0);

        let battery = self.battery.and_then(|b| {
            if b.available == Some(false) {
                return None;
            }
            let percent = b.percent.filter(|p| p.is_finite())?;
            Some(BatteryReading {
                percent: percent.clamp(0.0, 100.0) as u8,
                charging: b.charging.unwrap_or(false),
            })
        });

        StressReading {
            cpu_temp_c,
            battery,
        }
    }
}

/// HTTP client for the hardware monitor service
pub struct HwMonitorClient {
    client: Client,
    status_url: Url,
}

impl HwMonitorClient {
    /// Create a client for the monitor at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut base = Url::parse(base_url).context("Invalid hardware monitor URL")?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let status_url = base
            .join(SYSTEM_STATUS_PATH)
            .context("Invalid hardware monitor URL")?;

        Ok(Self { client, status_url })
    }

    pub fn status_url(&self) -> &Url {
        &self.status_url
    }

    /// Fetch and decode the system status
    pub async fn fetch(&self) -> Result<SystemStatus> {
        let response = self
            .client
            .get(self.status_url.clone())
            .send()
            .await
            .context("Failed to reach hardware monitor")?;

        if !response.status().is_success() {
            anyhow::bail!("hardware monitor returned {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse hardware monitor response")
    }
}

#[async_trait]
impl StressSource for HwMonitorClient {
    async fn read(&self) -> StressReading {
        match self.fetch().await {
            Ok(status) => {
                let reading = status.into_reading();
                debug!(
                    cpu_temp_c = reading.cpu_temp_c,
                    battery_percent = ?reading.battery.map(|b| b.percent),
                    charging = ?reading.battery.map(|b| b.charging),
                    "Stress reading"
                );
                reading
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to fetch hw-monitor status");
                StressReading::no_data()
            }
        }
    }
}
