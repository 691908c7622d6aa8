//! Reconciliation loop
//!
//! One tick observes the device and acts on it:
//! 1. Snapshot container health and read the stress sensors
//! 2. Restart unhealthy services and stopped critical services
//! 3. Apply thermal shedding, then battery shedding
//! 4. Clear restart counters once the reset interval has elapsed
//!
//! Ticks never overlap; the loop sleeps for the tick interval between them
//! and stops between ticks when a shutdown is signalled.

use crate::catalog::{Category, ServiceCatalog};
use crate::config::WatchdogConfig;
use crate::governor::{RestartDecision, RestartGovernor};
use crate::models::{ManagedService, RestartPolicy, RunState, StressReading};
use crate::observability::StructuredLogger;
use crate::probe::HealthProber;
use crate::runtime::ContainerRuntime;
use crate::shedding::{ShedOutcome, SheddingController, StressLevel, Stressor};
use crate::stress::StressSource;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::info;


/// Why a restart was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The runtime reports the container's health check failing
    Unhealthy,
    /// A critical service was found not running
    CriticalStopped,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::Unhealthy => f.write_str("unhealthy"),
            RestartReason::CriticalStopped => f.write_str("critical_stopped"),
        }
    }
}

/// Everything one tick observed and did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub services_seen: usize,
    pub reading: StressReading,
    pub restarted: Vec<String>,
    pub restart_denied: Vec<String>,
    pub restart_failed: Vec<String>,
    pub stopped: Vec<String>,
    pub started: Vec<String>,
    pub shed_failed: Vec<String>,
    /// Names dropped from the shed set because they were found running
    pub corrected: Vec<String>,
    pub counters_reset: bool,
}

impl TickReport {
    /// Lifecycle actions the runtime accepted this tick
    pub fn actions(&self) -> usize {
        self.restarted.len() + self.stopped.len() + self.started.len()
    }

    fn absorb(&mut self, outcome: ShedOutcome) {
        self.stopped.extend(outcome.stopped);
        self.started.extend(outcome.started);
        self.shed_failed.extend(outcome.failed);
        self.corrected.extend(outcome.corrected);
    }
}

/// Owns all watchdog state and drives the collaborators
pub struct Reconciler {
    config: WatchdogConfig,
    runtime: Arc<dyn ContainerRuntime>,
    prober: HealthProber,
    stress: Arc<dyn StressSource>,
    catalog: ServiceCatalog,
    governor: RestartGovernor,
    shedding: SheddingController,
    logger: StructuredLogger,
    last_reset: Instant,
}

impl Reconciler {
    pub fn new(
        config: WatchdogConfig,
        runtime: Arc<dyn ContainerRuntime>,
        stress: Arc<dyn StressSource>,
        logger: StructuredLogger,
    ) -> Self {
        let catalog = config.catalog();
        let governor = RestartGovernor::new(config.max_restart_attempts, config.restart_cooldown);
        let shedding = SheddingController::new(config.thermal, config.battery, logger.clone());

        Self {
            prober: HealthProber::new(Arc::clone(&runtime)),
            runtime,
            stress,
            catalog,
            governor,
            shedding,
            logger,
            config,
            last_reset: Instant::now(),
        }
    }

    /// Set the instant the counter reset interval is measured from
    pub fn with_reset_epoch(mut self, epoch: Instant) -> Self {
        self.last_reset = epoch;
        self
    }

    pub fn governor(&self) -> &RestartGovernor {
        &self.governor
    }

    pub fn shedding(&self) -> &SheddingController {
        &self.shedding
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Run one reconciliation pass at `now`
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut snapshot = self.prober.probe().await;
        let reading = self.stress.read().await;

        let mut report = TickReport {
            services_seen: snapshot.len(),
            reading,
            ..Default::default()
        };

        report.corrected = self.shedding.reconcile_observed(&snapshot);

        self.evaluate_restarts(&mut snapshot, now, &mut report).await;

        self.shedding.observe(&reading);
        for stressor in Stressor::ALL {
            self.apply_shedding(stressor, &reading, &mut snapshot, &mut report)
                .await;
        }

        if now.saturating_duration_since(self.last_reset) > self.config.counter_reset_interval {
            self.logger
                .log_counters_reset(self.governor.tracked_services());
            self.governor.reset_all();
            self.last_reset = now;
            report.counters_reset = true;
        }

        report
    }

    async fn evaluate_restarts(
        &mut self,
        snapshot: &mut [ManagedService],
        now: Instant,
        report: &mut TickReport,
    ) {
        let timeout_secs = self.config.stop_timeout_secs();

        for service in snapshot.iter_mut() {
            if self.shedding.is_shed(&service.name)
                || service.restart_policy == RestartPolicy::Manual
            {
                continue;
            }

            let Some(reason) = self.restart_reason(service) else {
                continue;
            };

            match self.governor.evaluate(&service.name, now) {
                RestartDecision::Allowed => {
                    match self.runtime.restart(&service.name, timeout_secs).await {
                        Ok(()) => {
                            let attempt = self.governor.record_restart(&service.name, now);
                            self.logger.log_restart(
                                &service.name,
                                reason,
                                attempt,
                                self.governor.max_attempts(),
                            );
                            service.run_state = RunState::Running;
                            report.restarted.push(service.name.clone());
                        }
                        Err(e) => {
                            self.logger.log_restart_failed(&service.name, reason, &e);
                            report.restart_failed.push(service.name.clone());
                        }
                    }
                }
                decision => {
                    self.logger
                        .log_restart_denied(&service.name, reason, decision);
                    report.restart_denied.push(service.name.clone());
                }
            }
        }
    }

    fn restart_reason(&self, service: &ManagedService) -> Option<RestartReason> {
        if service.is_unhealthy() {
            Some(RestartReason::Unhealthy)
        } else if !service.is_running() && self.catalog.has(&service.name, Category::Critical) {
            Some(RestartReason::CriticalStopped)
        } else {
            None
        }
    }

    async fn apply_shedding(
        &mut self,
        stressor: Stressor,
        reading: &StressReading,
        snapshot: &mut [ManagedService],
        report: &mut TickReport,
    ) {
        if self.shedding.level(stressor, reading) == StressLevel::Triggered {
            self.logger.log_stress_triggered(stressor, reading);
        }

        let actions = self
            .shedding
            .plan(stressor, reading, snapshot, &self.catalog);
        if actions.is_empty() {
            return;
        }

        let outcome = self
            .shedding
            .apply(actions, self.runtime.as_ref(), self.config.stop_timeout_secs())
            .await;

        for service in snapshot.iter_mut() {
            if outcome.stopped.contains(&service.name) {
                service.run_state = RunState::Stopped;
            } else if outcome.started.contains(&service.name)
                || outcome.corrected.contains(&service.name)
            {
                service.run_state = RunState::Running;
            }
        }

        report.absorb(outcome);
    }

    /// Tick until a shutdown message arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            services = self.catalog.len(),
            "Starting watchdog loop"
        );

        let mut tick_count = 0u64;

        loop {
            let report = self.tick(Instant::now()).await;
            tick_count += 1;
            self.logger.log_tick(tick_count, &report);

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down watchdog loop");
                    break;
                }
            }
        }
    }
}
