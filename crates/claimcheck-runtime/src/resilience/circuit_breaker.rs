//! Fail fast when a generation capability keeps erroring.
//!
//! Claims turned away by an open circuit degrade like any other generation
//! failure, so a dead backend costs one timeout per capability instead of
//! one per claim.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::generation::Capability;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before a trial
    #[serde(with = "crate::config::duration_human")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed { failures: u32 },
    Open { since: Instant },
    /// Letting trial calls through after the recovery timeout
    HalfOpen { successes: u32 },
}

impl Default for CircuitState {
    fn default() -> Self {
        CircuitState::Closed { failures: 0 }
    }
}

/// One circuit per capability: failing script generation must not block
/// plausibility checks.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<Capability, CircuitState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a call for `capability` may go ahead. An open circuit whose
    /// recovery timeout has passed moves to half-open and admits the call.
    pub fn admits(&self, capability: Capability) -> bool {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(capability).or_default();
        match *circuit {
            CircuitState::Open { since } if since.elapsed() >= self.config.recovery_timeout => {
                *circuit = CircuitState::HalfOpen { successes: 0 };
                tracing::info!(capability = %capability, "Circuit half-open, allowing a trial call");
                true
            }
            CircuitState::Open { .. } => false,
            _ => true,
        }
    }

    pub fn record_success(&self, capability: Capability) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(capability).or_default();
        *circuit = match *circuit {
            CircuitState::HalfOpen { successes } if successes + 1 < self.config.success_threshold => {
                CircuitState::HalfOpen {
                    successes: successes + 1,
                }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::info!(capability = %capability, "Circuit closed after recovery");
                CircuitState::default()
            }
            CircuitState::Closed { .. } => CircuitState::default(),
            open @ CircuitState::Open { .. } => open,
        };
    }

    pub fn record_failure(&self, capability: Capability) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(capability).or_default();
        *circuit = match *circuit {
            CircuitState::Closed { failures } if failures + 1 < self.config.failure_threshold => {
                CircuitState::Closed {
                    failures: failures + 1,
                }
            }
            CircuitState::Closed { failures } => {
                tracing::warn!(
                    capability = %capability,
                    failures = failures + 1,
                    "Circuit opened after repeated failures"
                );
                CircuitState::Open {
                    since: Instant::now(),
                }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::warn!(capability = %capability, "Trial call failed, circuit reopened");
                CircuitState::Open {
                    since: Instant::now(),
                }
            }
            open @ CircuitState::Open { .. } => open,
        };
    }

    pub fn state(&self, capability: Capability) -> CircuitState {
        self.circuits
            .lock()
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
