//! Structured logging for watchdog events
//!
//! Every significant decision is emitted as one JSON event with an `event`
//! field, so restarts and shedding can be audited from the log stream alone.

use crate::config::WatchdogConfig;
use crate::error::RuntimeError;
use crate::governor::RestartDecision;
use crate::models::StressReading;
use crate::reconciler::{RestartReason, TickReport};
use crate::shedding::Stressor;
use tracing::{debug, error, info, warn};

/// Structured logger for watchdog events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    device_name: String,
}

impl StructuredLogger {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Log watchdog startup with the effective configuration
    pub fn log_startup(&self, version: &str, config: &WatchdogConfig) {
        info!(
            event = "watchdog_started",
            device = %self.device_name,
            watchdog_version = %version,
            tick_interval_secs = config.tick_interval.as_secs(),
            max_restart_attempts = config.max_restart_attempts,
            restart_cooldown_secs = config.restart_cooldown.as_secs(),
            critical_services = ?config.critical_services,
            thermal_shed_services = ?config.thermal_shed_services,
            thermal_shed_temp_c = config.thermal.threshold_c,
            battery_shed_services = ?config.battery_shed_services,
            battery_shed_percent = config.battery.threshold_percent,
            hw_monitor_url = %config.hw_monitor_url,
            "Watchdog started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "watchdog_shutdown",
            device = %self.device_name,
            reason = %reason,
            "Watchdog shutting down"
        );
    }

    /// Log a restart that was issued and accepted by the runtime
    pub fn log_restart(&self, service: &str, reason: RestartReason, attempt: u32, max_attempts: u32) {
        info!(
            event = "service_restarted",
            device = %self.device_name,
            service = %service,
            reason = %reason,
            attempt = attempt,
            max_attempts = max_attempts,
            "Restarted service"
        );
    }

    pub fn log_restart_denied(&self, service: &str, reason: RestartReason, decision: RestartDecision) {
        match decision {
            RestartDecision::Allowed => {}
            RestartDecision::CoolingDown { remaining } => {
                info!(
                    event = "restart_denied",
                    device = %self.device_name,
                    service = %service,
                    reason = %reason,
                    denial = "cooldown",
                    cooldown_remaining_secs = remaining.as_secs(),
                    "Restart skipped, service in cooldown"
                );
            }
            RestartDecision::Exhausted { attempts } => {
                info!(
                    event = "restart_denied",
                    device = %self.device_name,
                    service = %service,
                    reason = %reason,
                    denial = "max_attempts",
                    attempts = attempts,
                    "Restart skipped, max attempts reached"
                );
            }
        }
    }

    pub fn log_restart_failed(&self, service: &str, reason: RestartReason, err: &RuntimeError) {
        error!(
            event = "restart_failed",
            device = %self.device_name,
            service = %service,
            reason = %reason,
            error = %err,
            "Failed to restart service"
        );
    }

    /// Log that a stressor crossed its trigger threshold this tick
    pub fn log_stress_triggered(&self, stressor: Stressor, reading: &StressReading) {
        match stressor {
            Stressor::Thermal => warn!(
                event = "stress_triggered",
                device = %self.device_name,
                stressor = %stressor,
                cpu_temp_c = reading.cpu_temp_c,
                "CPU temperature critical, shedding services"
            ),
            Stressor::Battery => warn!(
                event = "stress_triggered",
                device = %self.device_name,
                stressor = %stressor,
                battery_percent = reading.battery.map(|b| b.percent),
                "Battery low, shedding services"
            ),
        }
    }

    pub fn log_shed(&self, service: &str, stressor: Stressor) {
        warn!(
            event = "service_shed",
            device = %self.device_name,
            service = %service,
            stressor = %stressor,
            "Stopped service to shed load"
        );
    }

    pub fn log_unshed(&self, service: &str, stressor: Stressor) {
        info!(
            event = "service_unshed",
            device = %self.device_name,
            service = %service,
            stressor = %stressor,
            "Restarted previously shed service"
        );
    }

    pub fn log_shed_action_failed(
        &self,
        service: &str,
        stressor: Stressor,
        action: &str,
        err: &RuntimeError,
    ) {
        error!(
            event = "shed_action_failed",
            device = %self.device_name,
            service = %service,
            stressor = %stressor,
            action = %action,
            error = %err,
            "Shedding action failed"
        );
    }

    /// Log a shed service found running outside the watchdog's control
    pub fn log_shed_corrected(&self, service: &str) {
        warn!(
            event = "shed_set_corrected",
            device = %self.device_name,
            service = %service,
            "Shed service is running, no longer tracking it as shed"
        );
    }

    pub fn log_counters_reset(&self, tracked_services: usize) {
        info!(
            event = "restart_counters_reset",
            device = %self.device_name,
            tracked_services = tracked_services,
            "Reset restart counters"
        );
    }

    pub fn log_tick(&self, tick: u64, report: &TickReport) {
        debug!(
            event = "tick_completed",
            device = %self.device_name,
            tick = tick,
            services_seen = report.services_seen,
            restarted = report.restarted.len(),
            restart_denied = report.restart_denied.len(),
            restart_failed = report.restart_failed.len(),
            stopped = report.stopped.len(),
            started = report.started.len(),
            shed_failed = report.shed_failed.len(),
            corrected = report.corrected.len(),
            counters_reset = report.counters_reset,
            "Watchdog tick completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Records the level of every event it sees
    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

    impl<S: Subscriber> Layer<S> for LevelRecorder {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    fn levels_of(f: impl FnOnce()) -> Vec<Level> {
        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        tracing::subscriber::with_default(subscriber, f);
        let levels = recorder.0.lock().unwrap().clone();
        levels
    }

    #[test]
    fn test_restart_denials_are_informational() {
        let logger = StructuredLogger::new("test-device");

        let levels = levels_of(|| {
            logger.log_restart_denied(
                "mulecube-kiwix",
                RestartReason::Unhealthy,
                RestartDecision::CoolingDown {
                    remaining: Duration::from_secs(120),
                },
            );
            logger.log_restart_denied(
                "mulecube-kiwix",
                RestartReason::CriticalStopped,
                RestartDecision::Exhausted { attempts: 3 },
            );
        });

        assert_eq!(levels, vec![Level::INFO, Level::INFO]);
    }

    #[test]
    fn test_shed_triggers_warn() {
        let logger = StructuredLogger::new("test-device");

        let levels = levels_of(|| {
            logger.log_stress_triggered(Stressor::Thermal, &StressReading::no_data());
            logger.log_shed("mulecube-ollama", Stressor::Thermal);
        });

        assert_eq!(levels, vec![Level::WARN, Level::WARN]);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-device");
        assert_eq!(logger.device_name(), "test-device");
    }

    #[test]
    fn test_logging_without_subscriber_is_silent() {
        let logger = StructuredLogger::new("test-device");
        logger.log_shed("mulecube-ollama", Stressor::Thermal);
        logger.log_restart_denied(
            "mulecube-kiwix",
            RestartReason::Unhealthy,
            RestartDecision::Exhausted { attempts: 3 },
        );
        logger.log_tick(1, &TickReport::default());
    }
}
