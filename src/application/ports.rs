//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters (and external collaborators such as
//! the real validator, transcriber, processor, audit log, and vault)
//! implement these ports.

use crate::application::config::KernelConfig;
use crate::domain::signal::{MediaRef, ProcessingStatus, Signal, Stage};
use crate::domain::validation::{SchemaValidator, ValidationReport};
use std::fmt::Debug;
use std::time::{Duration, Instant, SystemTime};

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time without
/// depending on system clock implementation details. Infrastructure provides
/// concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Error from a counter store operation.
///
/// Any error from a shared store is treated by the throttle as "store
/// unreachable" and triggers transparent fallback to local counters.
#[derive(Debug, Clone)]
pub struct CounterError {
    message: String,
}

impl CounterError {
    /// Create a counter error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CounterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "counter store error: {}", self.message)
    }
}

impl std::error::Error for CounterError {}

/// Port for windowed retry counters.
///
/// A counter is keyed by scope (`"global"` or a service name) and resets
/// when its rolling window expires. The window expiry is armed only by the
/// first increment of a fresh window, so the ceiling resets exactly one
/// window length after the window opened.
///
/// Implementations: `InMemoryCounterStore` (process-local) and
/// `RedisCounterStore` (shared across cooperating processes, behind the
/// `redis-counters` feature).
pub trait CounterStore: Send + Sync + Debug {
    /// Atomically increment the counter for a scope, arming the window
    /// expiry if this increment opened the window. Returns the new count.
    fn increment(&self, scope: &str, window: Duration) -> Result<u64, CounterError>;

    /// Read the current count for a scope. An expired window reads as 0.
    fn get(&self, scope: &str, window: Duration) -> Result<u64, CounterError>;
}

/// Error raised by a pipeline stage (validator, transcriber, processor).
///
/// Stage timeouts are reported through this type as well, so a trial call
/// that times out while a breaker is half-open counts as a failure.
#[derive(Debug, Clone)]
pub struct StageError {
    message: String,
}

impl StageError {
    /// Create a stage error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message. May contain raw content; redact before it leaves
    /// the kernel.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StageError {}

/// Port for the validation stage.
///
/// A content rejection is expressed through the returned report
/// (`is_valid() == false`), not as an error. `Err(StageError)` means the
/// validator itself failed and counts against the validation breaker.
pub trait Validator: Send + Sync + Debug {
    /// Validate a signal against schema and content rules.
    fn validate(&self, signal: &Signal) -> Result<ValidationReport, StageError>;
}

/// The shipped rule-based validator satisfies the port directly. Its rules
/// are pure content checks, so a stage error never originates here.
impl Validator for SchemaValidator {
    fn validate(&self, signal: &Signal) -> Result<ValidationReport, StageError> {
        Ok(SchemaValidator::validate(self, signal))
    }
}

/// Port for the transcription stage.
pub trait Transcriber: Send + Sync + Debug {
    /// Convert the referenced media to text.
    fn transcribe(&self, media: &MediaRef) -> Result<String, StageError>;
}

/// Port for the processing stage (the business action).
pub trait Processor: Send + Sync + Debug {
    /// Execute the business action for a signal. The transcript, when
    /// present, is the transcription stage's output.
    fn process(&self, signal: &Signal, transcript: Option<&str>) -> Result<(), StageError>;
}

/// One append-only audit record.
///
/// The `detail` field must already be redacted by the time the event is
/// constructed; sinks never see raw payload content.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Wall-clock capture time
    pub timestamp: SystemTime,
    /// Stable event name ("signal_received", "signal_processed", ...)
    pub event_type: &'static str,
    /// Signal this event belongs to
    pub signal_id: String,
    /// Incident correlation identifier, stable across retries and stages
    pub incident_id: String,
    /// Stage the event relates to, when applicable
    pub stage: Option<Stage>,
    /// Terminal status, present on terminal events only
    pub status: Option<ProcessingStatus>,
    /// Processing attempts made so far
    pub attempt_count: u32,
    /// Redacted human-readable detail
    pub detail: String,
}

/// Error from an audit sink.
#[derive(Debug, Clone)]
pub struct AuditError {
    message: String,
}

impl AuditError {
    /// Create an audit error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "audit sink error: {}", self.message)
    }
}

impl std::error::Error for AuditError {}

/// Port for the append-only audit log.
///
/// Persistence and cryptographic chaining are the collaborator's concern. A
/// sink failure must never prevent the kernel from returning a terminal
/// result; the kernel logs the failure and continues.
pub trait AuditSink: Send + Sync + Debug {
    /// Append one audit event.
    fn append(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Error from the vault.
#[derive(Debug, Clone)]
pub struct VaultError {
    message: String,
}

impl VaultError {
    /// Create a vault error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vault error: {}", self.message)
    }
}

impl std::error::Error for VaultError {}

/// Port for the encrypted vault storing denied/failed payloads.
pub trait Vault: Send + Sync + Debug {
    /// Store a denied document with a reason; returns an opaque vault id.
    fn deny(&self, doc: &str, reason: &str) -> Result<String, VaultError>;
}

/// Port for reading current configuration.
///
/// The kernel re-reads configuration through this port at every invocation
/// rather than caching values, so hot-reload (an external concern) takes
/// effect without kernel restarts.
pub trait ConfigSource: Send + Sync + Debug {
    /// Snapshot of the current configuration.
    fn snapshot(&self) -> KernelConfig;
}
