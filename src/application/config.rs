//! Kernel configuration surface.
//!
//! Values here are read through the [`ConfigSource`] port at invocation time.
//! Loading and hot-reloading configuration from files or the environment is
//! an external collaborator concern; [`StaticConfig`] covers the common case
//! of an in-process value that operators may swap at runtime.

use crate::application::circuit_breaker::BreakerConfig;
use crate::application::ports::ConfigSource;
use crate::domain::redaction::DEFAULT_REDACTORS;
use crate::domain::signal::Stage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Configuration consumed by the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Ceiling on attempts per rolling window, shared across all services
    pub global_retry_ceiling: u64,
    /// Attempts allowed per signal per service before `Failed`
    pub per_service_retry_ceiling: u32,
    /// Base of the exponential backoff between retry attempts
    pub retry_backoff_base: f64,
    /// Cap on a single backoff delay
    pub retry_backoff_max: Duration,
    /// Length of the rolling throttle window
    pub retry_window: Duration,
    /// Signals scoring below this threshold are `Ignored`
    pub score_threshold: f64,
    /// Redactors applied before content leaves the kernel, in order
    pub enabled_redactors: Vec<String>,
    /// Error aggregator buffer capacity before a vault flush
    pub aggregator_capacity: usize,
    /// Breaker tuning for the validation stage
    pub validation_breaker: BreakerConfig,
    /// Breaker tuning for the transcription stage
    pub transcription_breaker: BreakerConfig,
    /// Breaker tuning for the processing stage
    pub processing_breaker: BreakerConfig,
}

impl KernelConfig {
    /// Breaker configuration for a stage.
    pub fn breaker_for(&self, stage: Stage) -> BreakerConfig {
        match stage {
            Stage::Validation => self.validation_breaker.clone(),
            Stage::Transcription => self.transcription_breaker.clone(),
            Stage::Processing => self.processing_breaker.clone(),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            global_retry_ceiling: 50,
            per_service_retry_ceiling: 3,
            retry_backoff_base: 2.0,
            retry_backoff_max: Duration::from_secs(30),
            retry_window: Duration::from_secs(60),
            score_threshold: 0.85,
            enabled_redactors: DEFAULT_REDACTORS.iter().map(|s| s.to_string()).collect(),
            aggregator_capacity: 100,
            validation_breaker: BreakerConfig {
                failure_threshold: 10,
                recovery_timeout: Duration::from_secs(30),
                success_threshold: 2,
            },
            transcription_breaker: BreakerConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(60),
                success_threshold: 2,
            },
            processing_breaker: BreakerConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(45),
                success_threshold: 2,
            },
        }
    }
}

/// In-process configuration holder.
///
/// Cloning shares the underlying value, so an operator handle can update the
/// configuration while the kernel keeps reading fresh snapshots.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    inner: Arc<RwLock<KernelConfig>>,
}

impl StaticConfig {
    /// Wrap a configuration value.
    pub fn new(config: KernelConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Replace the current configuration.
    pub fn update(&self, config: KernelConfig) {
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

impl ConfigSource for StaticConfig {
    fn snapshot(&self) -> KernelConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = KernelConfig::default();
        assert_eq!(config.global_retry_ceiling, 50);
        assert_eq!(config.per_service_retry_ceiling, 3);
        assert_eq!(config.retry_backoff_base, 2.0);
        assert_eq!(config.retry_backoff_max, Duration::from_secs(30));
        assert_eq!(config.retry_window, Duration::from_secs(60));
        assert_eq!(config.score_threshold, 0.85);
        assert_eq!(config.aggregator_capacity, 100);
        assert_eq!(config.validation_breaker.failure_threshold, 10);
        assert_eq!(config.transcription_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.processing_breaker.recovery_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_static_config_update_visible_to_snapshots() {
        let source = StaticConfig::new(KernelConfig::default());
        assert_eq!(source.snapshot().per_service_retry_ceiling, 3);

        let mut updated = KernelConfig::default();
        updated.per_service_retry_ceiling = 5;
        source.update(updated);

        assert_eq!(source.snapshot().per_service_retry_ceiling, 5);
    }
}
