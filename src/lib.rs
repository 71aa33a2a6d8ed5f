//! Resilient signal processing kernel.
//!
//! Runs inbound signals through a guarded pipeline: retry throttling,
//! schema validation, optional media transcription, threshold evaluation,
//! and processing with bounded retries. Every stage call is wrapped by a
//! per-stage, per-service circuit breaker, and every piece of text that
//! leaves the kernel passes through a configurable PII redaction pipeline.
//!
//! # Quick Start
//!
//! ```ignore
//! use signal_kernel::{
//!     ErrorAggregator, KernelConfig, RetryThrottle, Signal, SignalKernel, StaticConfig,
//! };
//! use signal_kernel::infrastructure::clock::SystemClock;
//! use signal_kernel::infrastructure::counters::InMemoryCounterStore;
//! use signal_kernel::infrastructure::audit::TracingAuditLog;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(SystemClock::new());
//! let config = Arc::new(StaticConfig::new(KernelConfig::default()));
//! let throttle = RetryThrottle::local_only(Arc::new(InMemoryCounterStore::new(clock.clone())));
//! let audit = Arc::new(TracingAuditLog::new());
//! let aggregator = Arc::new(ErrorAggregator::new(100, my_vault, audit.clone()));
//!
//! let kernel = SignalKernel::builder(
//!     config, clock, throttle,
//!     my_validator, my_transcriber, my_processor,
//!     audit, aggregator,
//! )
//! .build()?;
//!
//! let result = kernel.process(Signal::new("relay").with_field("text", "status update"));
//! println!("{:?} after {} attempts", result.status, result.attempt_count);
//! ```
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture:
//!
//! - **Domain**: signal model, validation rules, redaction (pure logic)
//! - **Application**: kernel orchestration, circuit breakers, throttle,
//!   aggregator, and the ports they depend on
//! - **Infrastructure**: clock, counter stores, audit adapters, mocks
//!
//! External collaborators (the real validator, transcriber, processor,
//! audit log, and vault) plug in through the port traits in
//! [`application::ports`].
//!
//! # Degraded Modes
//!
//! - A shared counter store outage degrades the throttle to process-local
//!   counters with identical window semantics; recovery never replays
//!   outage-period counts.
//! - Audit sink or vault failures are logged and never prevent the kernel
//!   from returning a terminal result.
//!
//! # Features
//!
//! - `redis-counters`: Redis-backed shared retry counters
//! - `test-helpers`: export the mock collaborators for integration tests

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::aggregator::{ErrorAggregator, ErrorEntry};
pub use application::circuit_breaker::{
    BreakerConfig, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState,
};
pub use application::config::{KernelConfig, StaticConfig};
pub use application::kernel::{BuildError, SignalKernel, SignalKernelBuilder};
pub use application::metrics::{KernelMetrics, MetricsSnapshot};
pub use application::ports::{
    AuditError, AuditEvent, AuditSink, Clock, ConfigSource, CounterError, CounterStore, Processor,
    StageError, Transcriber, Validator, Vault, VaultError,
};
pub use application::throttle::{RetryThrottle, ThrottleSettings, ThrottleVerdict};
pub use domain::redaction::{RedactionPipeline, UnknownRedactor, DEFAULT_REDACTORS};
pub use domain::signal::{
    MediaRef, MediaType, ProcessingResult, ProcessingStatus, Signal, SignalPriority, Stage,
};
pub use domain::validation::{SchemaValidator, ValidationReport, DEFAULT_FORBIDDEN_PHRASES};
pub use infrastructure::clock::SystemClock;
pub use infrastructure::counters::InMemoryCounterStore;

#[cfg(feature = "redis-counters")]
pub use infrastructure::redis_counters::{RedisCounterConfig, RedisCounterStore};
