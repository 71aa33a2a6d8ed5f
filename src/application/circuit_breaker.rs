//! Per-stage, per-service circuit breakers.
//!
//! A breaker isolates one (stage, service) pair: consecutive failures open
//! it, an open breaker rejects calls without invoking the stage, and after a
//! recovery timeout a single trial call tests whether the downstream
//! capability recovered.
//!
//! A rejection by an open breaker is not a downstream failure: it never
//! increments `failure_count`, and the kernel surfaces it as a distinct
//! outcome ("circuit open") rather than a stage error.

use crate::application::ports::Clock;
use crate::domain::signal::Stage;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Operating normally; all calls allowed
    Closed,
    /// Failure threshold reached; calls rejected until recovery timeout
    Open,
    /// Probing recovery with a limited trial call
    HalfOpen,
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Wait before admitting a trial call after opening
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes required to close the circuit
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Point-in-time view of a breaker's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures since the last reset
    pub failure_count: u32,
    /// Consecutive successes while half-open
    pub success_count: u32,
    /// When the most recent failure was recorded
    pub last_failure_time: Option<Instant>,
    /// When the circuit last opened
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    opened_at: Option<Instant>,
    /// A half-open trial call has been admitted and has not yet resolved
    trial_pending: bool,
}

/// Fault-isolation state machine for one (stage, service) pair.
///
/// All transitions happen under a lock scoped to this breaker, so unrelated
/// services are never serialized against each other. Concurrent callers
/// racing the `Open -> HalfOpen` transition admit exactly one trial call;
/// everyone else stays rejected until the trial resolves through
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure).
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                opened_at: None,
                trial_pending: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCore> {
        match self.core.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// May a call proceed?
    ///
    /// In `Open`, the first caller after the recovery timeout flips the
    /// breaker to `HalfOpen` and is itself admitted as the trial call; all
    /// other callers are rejected until the trial resolves.
    pub fn allow(&self) -> bool {
        let now = self.clock.now();
        let mut core = self.lock();
        match core.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = core
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.recovery_timeout {
                    core.state = CircuitState::HalfOpen;
                    core.success_count = 0;
                    core.trial_pending = true;
                    tracing::info!(breaker = %self.name, "circuit breaker entering half-open");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if core.trial_pending {
                    false
                } else {
                    core.trial_pending = true;
                    true
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut core = self.lock();
        match core.state {
            CircuitState::Closed => {
                core.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                core.trial_pending = false;
                core.success_count += 1;
                if core.success_count >= self.config.success_threshold {
                    core.state = CircuitState::Closed;
                    core.failure_count = 0;
                    core.success_count = 0;
                    core.opened_at = None;
                    tracing::info!(breaker = %self.name, "circuit breaker closed (recovered)");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    ///
    /// In `HalfOpen` a single failure reopens the circuit and re-arms the
    /// recovery window from the failure's time.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut core = self.lock();
        core.last_failure_time = Some(now);
        match core.state {
            CircuitState::Closed => {
                core.failure_count += 1;
                if core.failure_count >= self.config.failure_threshold {
                    core.state = CircuitState::Open;
                    core.opened_at = Some(now);
                    core.success_count = 0;
                    tracing::warn!(
                        breaker = %self.name,
                        failures = core.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                core.state = CircuitState::Open;
                core.opened_at = Some(now);
                core.success_count = 0;
                core.trial_pending = false;
                tracing::warn!(breaker = %self.name, "circuit breaker reopened after half-open failure");
            }
            CircuitState::Open => {}
        }
    }

    /// Snapshot the breaker state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.lock();
        BreakerSnapshot {
            state: core.state,
            failure_count: core.failure_count,
            success_count: core.success_count,
            last_failure_time: core.last_failure_time,
            opened_at: core.opened_at,
        }
    }

    /// Force the breaker back to `Closed`, clearing counters.
    pub fn reset(&self) {
        let mut core = self.lock();
        core.state = CircuitState::Closed;
        core.failure_count = 0;
        core.success_count = 0;
        core.trial_pending = false;
        core.opened_at = None;
    }
}

/// Table of breakers keyed by (stage, service).
///
/// Breakers are created lazily on first use with the configuration current
/// at that moment. The table uses fine-grained locking, so traffic for one
/// service never blocks another.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<(Stage, String), Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    /// Create an empty registry.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            clock,
        }
    }

    /// Get or create the breaker guarding `stage` for `service`.
    pub fn breaker(&self, stage: Stage, service: &str, config: &BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(&(stage, service.to_string())) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .breakers
            .entry((stage, service.to_string()))
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    format!("{}:{}", stage.name(), service),
                    config.clone(),
                    Arc::clone(&self.clock),
                ))
            });
        Arc::clone(entry.value())
    }

    /// Snapshot every breaker in the table.
    pub fn snapshots(&self) -> Vec<((Stage, String), BreakerSnapshot)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
