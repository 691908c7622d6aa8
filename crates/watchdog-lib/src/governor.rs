//! Restart rate limiting
//!
//! Tracks restart attempts per service and decides whether another restart
//! is currently permitted. Denials are normal outcomes, not errors.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default attempts before a service is left alone until the next reset
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default minimum time between two restarts of the same service
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Restart bookkeeping for one service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartRecord {
    pub attempt_count: u32,
    pub last_restart_at: Option<Instant>,
}

/// Outcome of a restart evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Allowed,
    /// The previous restart is too recent
    CoolingDown { remaining: Duration },
    /// The attempt budget is spent until the counters are reset
    Exhausted { attempts: u32 },
}

impl RestartDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RestartDecision::Allowed)
    }
}

/// Per-service restart attempt counters and cooldowns
#[derive(Debug)]
pub struct RestartGovernor {
    max_attempts: u32,
    cooldown: Duration,
    records: HashMap<String, RestartRecord>,
}

impl Default for RestartGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_COOLDOWN)
    }
}

impl RestartGovernor {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            cooldown,
            records: HashMap::new(),
        }
    }

    /// Evaluate whether `name` may be restarted at `now`
    ///
    /// Cooldown is checked before the attempt budget, so an exhausted service
    /// still reports its cooldown while that is running.
    pub fn evaluate(&self, name: &str, now: Instant) -> RestartDecision {
        let Some(record) = self.records.get(name) else {
            return if self.max_attempts == 0 {
                RestartDecision::Exhausted { attempts: 0 }
            } else {
                RestartDecision::Allowed
            };
        };

        if let Some(last) = record.last_restart_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                return RestartDecision::CoolingDown {
                    remaining: self.cooldown - elapsed,
                };
            }
        }

        if record.attempt_count >= self.max_attempts {
            return RestartDecision::Exhausted {
                attempts: record.attempt_count,
            };
        }

        RestartDecision::Allowed
    }

    pub fn should_restart(&self, name: &str, now: Instant) -> bool {
        self.evaluate(name, now).is_allowed()
    }

    /// Record a restart that was actually issued
    ///
    /// Returns the updated attempt count.
    pub fn record_restart(&mut self, name: &str, now: Instant) -> u32 {
        let record = self.records.entry(name.to_string()).or_default();
        record.attempt_count += 1;
        record.last_restart_at = Some(now);
        record.attempt_count
    }

    /// Forget every record
    pub fn reset_all(&mut self) {
        self.records.clear();
    }

    pub fn record(&self, name: &str) -> Option<&RestartRecord> {
        self.records.get(name)
    }

    pub fn tracked_services(&self) -> usize {
        self.records.len()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
