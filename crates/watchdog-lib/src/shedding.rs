//! Thermal and battery load shedding
//!
//! Two independent stressors decide when to stop non-essential services and
//! when it is safe to bring them back. Each has a trigger threshold and a
//! hysteresis band; inside the band the controller holds its current state.
//!
//! The shed set is category-agnostic. Eligibility is looked up from the
//! catalog on every evaluation. Each stressor keeps a latch that is set when
//! it triggers and cleared when it recovers; a service eligible under both
//! stressors is only started again once neither latch is set.

use crate::catalog::{Category, ServiceCatalog};
use crate::models::{ManagedService, StressReading};
use crate::observability::StructuredLogger;
use crate::runtime::ContainerRuntime;
use std::collections::BTreeSet;
use std::fmt;

/// Fixed thermal hysteresis margin
pub const THERMAL_HYSTERESIS_C: f64 = 5.0;

/// Fixed battery hysteresis margin, in percentage points
pub const BATTERY_HYSTERESIS_PERCENT: u8 = 5;

/// Source of environmental stress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stressor {
    Thermal,
    Battery,
}

impl Stressor {
    pub const ALL: [Stressor; 2] = [Stressor::Thermal, Stressor::Battery];

    /// Catalog category of services eligible for this stressor
    pub fn category(self) -> Category {
        match self {
            Stressor::Thermal => Category::ThermalShed,
            Stressor::Battery => Category::BatteryShed,
        }
    }

    pub fn other(self) -> Stressor {
        match self {
            Stressor::Thermal => Stressor::Battery,
            Stressor::Battery => Stressor::Thermal,
        }
    }
}

impl fmt::Display for Stressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stressor::Thermal => f.write_str("thermal"),
            Stressor::Battery => f.write_str("battery"),
        }
    }
}

/// Where a reading sits relative to a stressor's thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressLevel {
    /// At or past the threshold: shed
    Triggered,
    /// Inside the hysteresis band: keep whatever state we are in
    Holding,
    /// Clear of the band: shed services may come back
    Recovered,
    /// No usable data this tick: take no action
    NoData,
}

/// CPU temperature thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalPolicy {
    pub threshold_c: f64,
    pub hysteresis_c: f64,
}

impl ThermalPolicy {
    pub fn new(threshold_c: f64) -> Self {
        Self {
            threshold_c,
            hysteresis_c: THERMAL_HYSTERESIS_C,
        }
    }

    pub fn level(&self, reading: &StressReading) -> StressLevel {
        match reading.cpu_temp() {
            None => StressLevel::NoData,
            Some(t) if t >= self.threshold_c => StressLevel::Triggered,
            Some(t) if t < self.threshold_c - self.hysteresis_c => StressLevel::Recovered,
            Some(_) => StressLevel::Holding,
        }
    }
}

/// Battery charge thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryPolicy {
    pub threshold_percent: u8,
    pub hysteresis_percent: u8,
}

impl BatteryPolicy {
    pub fn new(threshold_percent: u8) -> Self {
        Self {
            threshold_percent,
            hysteresis_percent: BATTERY_HYSTERESIS_PERCENT,
        }
    }

    /// Charging suppresses the trigger and counts as recovery
    pub fn level(&self, reading: &StressReading) -> StressLevel {
        let Some(battery) = reading.battery else {
            return StressLevel::NoData;
        };
        let recovered_above =
            u16::from(self.threshold_percent) + u16::from(self.hysteresis_percent);

        if battery.charging || u16::from(battery.percent) > recovered_above {
            StressLevel::Recovered
        } else if battery.percent <= self.threshold_percent {
            StressLevel::Triggered
        } else {
            StressLevel::Holding
        }
    }
}

/// A lifecycle action planned by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShedAction {
    Stop { name: String, stressor: Stressor },
    Start { name: String, stressor: Stressor },
}

/// What happened when a batch of actions was applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShedOutcome {
    pub stopped: Vec<String>,
    pub started: Vec<String>,
    pub failed: Vec<String>,
    /// Names dropped from the shed set because the runtime reported them running
    pub corrected: Vec<String>,
}

/// Owns the shed set and decides shed/unshed actions
pub struct SheddingController {
    thermal: ThermalPolicy,
    battery: BatteryPolicy,
    shed: BTreeSet<String>,
    thermal_active: bool,
    battery_active: bool,
    logger: StructuredLogger,
}

impl SheddingController {
    pub fn new(thermal: ThermalPolicy, battery: BatteryPolicy, logger: StructuredLogger) -> Self {
        Self {
            thermal,
            battery,
            shed: BTreeSet::new(),
            thermal_active: false,
            battery_active: false,
            logger,
        }
    }

    pub fn level(&self, stressor: Stressor, reading: &StressReading) -> StressLevel {
        match stressor {
            Stressor::Thermal => self.thermal.level(reading),
            Stressor::Battery => self.battery.level(reading),
        }
    }

    /// Update each stressor's latch from this tick's reading
    ///
    /// Triggered sets the latch, Recovered clears it, and readings inside the
    /// band or without data leave it as it was.
    pub fn observe(&mut self, reading: &StressReading) {
        for stressor in Stressor::ALL {
            let active = match self.level(stressor, reading) {
                StressLevel::Triggered => true,
                StressLevel::Recovered => false,
                StressLevel::Holding | StressLevel::NoData => continue,
            };
            match stressor {
                Stressor::Thermal => self.thermal_active = active,
                Stressor::Battery => self.battery_active = active,
            }
        }
    }

    /// Whether `stressor` has triggered and not yet recovered
    pub fn is_active(&self, stressor: Stressor) -> bool {
        match stressor {
            Stressor::Thermal => self.thermal_active,
            Stressor::Battery => self.battery_active,
        }
    }

    pub fn is_shed(&self, name: &str) -> bool {
        self.shed.contains(name)
    }

    pub fn shed_services(&self) -> impl Iterator<Item = &str> {
        self.shed.iter().map(String::as_str)
    }

    pub fn shed_count(&self) -> usize {
        self.shed.len()
    }

    /// Plan the actions one stressor wants this tick
    ///
    /// Triggered: stop every running, eligible service not already shed.
    /// Recovered: start every shed, eligible service unless it is also
    /// eligible for the other stressor and that stressor's latch is set.
    /// Call [`observe`](Self::observe) with the same reading first.
    pub fn plan(
        &self,
        stressor: Stressor,
        reading: &StressReading,
        snapshot: &[ManagedService],
        catalog: &ServiceCatalog,
    ) -> Vec<ShedAction> {
        let category = stressor.category();

        match self.level(stressor, reading) {
            StressLevel::Triggered => snapshot
                .iter()
                .filter(|s| s.is_running())
                .filter(|s| !self.shed.contains(&s.name))
                .filter(|s| catalog.has(&s.name, category))
                .map(|s| ShedAction::Stop {
                    name: s.name.clone(),
                    stressor,
                })
                .collect(),
            StressLevel::Recovered => {
                let other = stressor.other();
                let other_active = self.is_active(other);

                self.shed
                    .iter()
                    .filter(|name| catalog.has(name, category))
                    .filter(|name| !(other_active && catalog.has(name, other.category())))
                    .map(|name| ShedAction::Start {
                        name: name.clone(),
                        stressor,
                    })
                    .collect()
            }
            StressLevel::Holding | StressLevel::NoData => Vec::new(),
        }
    }

    /// Issue planned actions, updating the shed set only for those that succeed
    pub async fn apply(
        &mut self,
        actions: Vec<ShedAction>,
        runtime: &dyn ContainerRuntime,
        stop_timeout_secs: u32,
    ) -> ShedOutcome {
        let mut outcome = ShedOutcome::default();

        for action in actions {
            match action {
                ShedAction::Stop { name, stressor } => {
                    match runtime.stop(&name, stop_timeout_secs).await {
                        Ok(()) => {
                            self.logger.log_shed(&name, stressor);
                            self.shed.insert(name.clone());
                            outcome.stopped.push(name);
                        }
                        Err(e) => {
                            self.logger
                                .log_shed_action_failed(&name, stressor, "stop", &e);
                            outcome.failed.push(name);
                        }
                    }
                }
                ShedAction::Start { name, stressor } => match runtime.start(&name).await {
                    Ok(()) => {
                        self.logger.log_unshed(&name, stressor);
                        self.shed.remove(&name);
                        outcome.started.push(name);
                    }
                    Err(e) if e.is_not_modified() => {
                        self.logger.log_shed_corrected(&name);
                        self.shed.remove(&name);
                        outcome.corrected.push(name);
                    }
                    Err(e) => {
                        self.logger
                            .log_shed_action_failed(&name, stressor, "start", &e);
                        outcome.failed.push(name);
                    }
                },
            }
        }

        outcome
    }

    /// Drop shed-set members the runtime reports as running
    ///
    /// Something other than this controller started them; observed state
    /// wins over memory.
    pub fn reconcile_observed(&mut self, snapshot: &[ManagedService]) -> Vec<String> {
        let running: Vec<String> = snapshot
            .iter()
            .filter(|s| s.is_running() && self.shed.contains(&s.name))
            .map(|s| s.name.clone())
            .collect();

        for name in &running {
            self.logger.log_shed_corrected(name);
            self.shed.remove(name);
        }

        running
    }
}
