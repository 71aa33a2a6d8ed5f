//! Two-tier retry throttle.
//!
//! Attempts are counted against a `global` scope and a per-service scope in
//! rolling windows. Both tiers are consulted before every attempt. Counters
//! live in a [`CounterStore`]: when a shared store (Redis) is configured and
//! reachable, the ceiling is enforced across all cooperating processes; any
//! store error degrades transparently to an in-process counter with
//! identical windowing semantics. The degradation is an accepted mode, not
//! an error, and recovery never replays counts accumulated locally during
//! the outage.

use crate::application::config::KernelConfig;
use crate::application::ports::{CounterStore, StageError};
use std::sync::Arc;
use std::time::Duration;

/// Scope name for the cross-service tier.
pub const GLOBAL_SCOPE: &str = "global";

/// Throttle tuning extracted from a configuration snapshot.
#[derive(Debug, Clone)]
pub struct ThrottleSettings {
    /// Ceiling on attempts per window, applied to each scope
    pub ceiling: u64,
    /// Rolling window length
    pub window: Duration,
    /// Exponential backoff base
    pub backoff_base: f64,
    /// Cap on a single backoff delay
    pub backoff_max: Duration,
}

impl From<&KernelConfig> for ThrottleSettings {
    fn from(config: &KernelConfig) -> Self {
        Self {
            ceiling: config.global_retry_ceiling,
            window: config.retry_window,
            backoff_base: config.retry_backoff_base,
            backoff_max: config.retry_backoff_max,
        }
    }
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// Both tiers are under their ceilings
    Admitted,
    /// The cross-service ceiling is exhausted
    GlobalExceeded,
    /// The per-service ceiling is exhausted
    ServiceExceeded,
}

impl ThrottleVerdict {
    /// Whether an attempt may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, ThrottleVerdict::Admitted)
    }

    /// Short reason string for audit entries.
    pub fn reason(&self) -> &'static str {
        match self {
            ThrottleVerdict::Admitted => "admitted",
            ThrottleVerdict::GlobalExceeded => "global retry limit exceeded",
            ThrottleVerdict::ServiceExceeded => "service retry limit exceeded",
        }
    }
}

/// Two-tier rate limiter with pluggable shared backend and local fallback.
#[derive(Debug, Clone)]
pub struct RetryThrottle {
    shared: Option<Arc<dyn CounterStore>>,
    local: Arc<dyn CounterStore>,
}

impl RetryThrottle {
    /// Throttle backed only by a process-local counter store.
    pub fn local_only(local: Arc<dyn CounterStore>) -> Self {
        Self {
            shared: None,
            local,
        }
    }

    /// Throttle backed by a shared store, degrading to `local` on any
    /// shared-store error.
    pub fn with_shared(shared: Arc<dyn CounterStore>, local: Arc<dyn CounterStore>) -> Self {
        Self {
            shared: Some(shared),
            local,
        }
    }

    fn read(&self, scope: &str, window: Duration) -> u64 {
        if let Some(shared) = &self.shared {
            match shared.get(scope, window) {
                Ok(count) => return count,
                Err(e) => {
                    tracing::warn!(scope, error = %e, "shared counter read failed, using local fallback");
                }
            }
        }
        self.local.get(scope, window).unwrap_or(0)
    }

    fn bump(&self, scope: &str, window: Duration) -> u64 {
        if let Some(shared) = &self.shared {
            match shared.increment(scope, window) {
                Ok(count) => return count,
                Err(e) => {
                    tracing::warn!(scope, error = %e, "shared counter increment failed, using local fallback");
                }
            }
        }
        match self.local.increment(scope, window) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(scope, error = %e, "local counter increment failed");
                0
            }
        }
    }

    /// Check both tiers without consuming an attempt.
    pub fn check_detailed(&self, service: &str, settings: &ThrottleSettings) -> ThrottleVerdict {
        if self.read(GLOBAL_SCOPE, settings.window) >= settings.ceiling {
            return ThrottleVerdict::GlobalExceeded;
        }
        if self.read(service, settings.window) >= settings.ceiling {
            return ThrottleVerdict::ServiceExceeded;
        }
        ThrottleVerdict::Admitted
    }

    /// May an attempt be made now?
    pub fn check(&self, service: &str, settings: &ThrottleSettings) -> bool {
        self.check_detailed(service, settings).is_admitted()
    }

    /// Claim an attempt slot against both tiers in one step.
    ///
    /// Admission is decided by the count the increment itself returns, so
    /// concurrent callers cannot slip past the ceiling between a read and a
    /// write. A rejected claim still leaves the counter at the ceiling, which
    /// keeps the window blocked exactly as a successful last claim would.
    pub fn try_acquire(&self, service: &str, settings: &ThrottleSettings) -> ThrottleVerdict {
        if self.bump(GLOBAL_SCOPE, settings.window) > settings.ceiling {
            return ThrottleVerdict::GlobalExceeded;
        }
        if self.bump(service, settings.window) > settings.ceiling {
            return ThrottleVerdict::ServiceExceeded;
        }
        ThrottleVerdict::Admitted
    }

    /// Record that an attempt occurred, against both the global and the
    /// per-service counters.
    pub fn increment(&self, service: &str, settings: &ThrottleSettings) {
        self.bump(GLOBAL_SCOPE, settings.window);
        self.bump(service, settings.window);
    }

    /// Delay before retry attempt `attempt` (1-based) of the same signal
    /// against the same service: `min(backoff_max, backoff_base ^ attempt)`.
    pub fn backoff_delay(&self, attempt: u32, settings: &ThrottleSettings) -> Duration {
        let raw = settings.backoff_base.powi(attempt as i32);
        if !raw.is_finite() || raw < 0.0 {
            return settings.backoff_max;
        }
        Duration::from_secs_f64(raw).min(settings.backoff_max)
    }
}

/// Error surfaced as the `Throttled` terminal status.
#[derive(Debug, Clone)]
pub struct ThrottleExceeded {
    verdict: ThrottleVerdict,
}

impl ThrottleExceeded {
    /// Wrap a non-admitted verdict.
    pub fn new(verdict: ThrottleVerdict) -> Self {
        Self { verdict }
    }

    /// The tier that rejected the attempt.
    pub fn verdict(&self) -> ThrottleVerdict {
        self.verdict
    }
}

impl std::fmt::Display for ThrottleExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verdict.reason())
    }
}

impl std::error::Error for ThrottleExceeded {}

impl From<ThrottleExceeded> for StageError {
    fn from(e: ThrottleExceeded) -> Self {
        StageError::new(e.to_string())
    }
}
