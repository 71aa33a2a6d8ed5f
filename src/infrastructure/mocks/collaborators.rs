//! Test doubles for the kernel's collaborators.
//!
//! Every double records the calls it receives and exposes switches to
//! script failures, so tests can drive breaker, throttle, and aggregator
//! behavior deterministically.

use crate::application::ports::{
    AuditError, AuditEvent, AuditSink, Clock, CounterError, CounterStore, Processor, StageError,
    Transcriber, Validator, Vault, VaultError,
};
use crate::domain::signal::{MediaRef, Signal};
use crate::domain::validation::{SchemaValidator, ValidationReport};
use crate::infrastructure::counters::InMemoryCounterStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory audit sink recording every appended event.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl MemoryAuditLog {
    /// Create an empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events appended so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        lock(&self.events).clone()
    }

    /// Events of one type, in order.
    pub fn events_of(&self, event_type: &str) -> Vec<AuditEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Make subsequent appends fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::new("audit sink unavailable"));
        }
        lock(&self.events).push(event);
        Ok(())
    }
}

/// One document stored by [`MemoryVault`].
#[derive(Debug, Clone)]
pub struct VaultEntry {
    /// Stored document text
    pub doc: String,
    /// Reason given at deny time
    pub reason: String,
    /// Vault id returned to the caller
    pub vault_id: String,
}

/// In-memory vault recording denied documents.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<Vec<VaultEntry>>,
    failing: AtomicBool,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored documents, in order.
    pub fn entries(&self) -> Vec<VaultEntry> {
        lock(&self.entries).clone()
    }

    /// Make subsequent stores fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Vault for MemoryVault {
    fn deny(&self, doc: &str, reason: &str) -> Result<String, VaultError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::new("vault unavailable"));
        }
        let mut entries = lock(&self.entries);
        let vault_id = format!("vault-{}", entries.len() + 1);
        entries.push(VaultEntry {
            doc: doc.to_string(),
            reason: reason.to_string(),
            vault_id: vault_id.clone(),
        });
        Ok(vault_id)
    }
}

/// Counter store that can be switched to an unreachable state.
///
/// While unreachable every operation returns an error, which the throttle
/// treats as a shared-store outage. Counts accepted before and after the
/// outage are preserved.
pub struct FlakyCounterStore {
    inner: InMemoryCounterStore,
    unreachable: AtomicBool,
}

impl fmt::Debug for FlakyCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakyCounterStore")
            .field("unreachable", &self.unreachable.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl FlakyCounterStore {
    /// Create a reachable store reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryCounterStore::new(clock),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Toggle the outage state.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Current count for a scope, bypassing the outage switch.
    pub fn count(&self, scope: &str) -> u64 {
        self.inner.get(scope, Duration::MAX).unwrap_or(0)
    }

    fn check_reachable(&self) -> Result<(), CounterError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CounterError::new("store unreachable"));
        }
        Ok(())
    }
}

impl CounterStore for FlakyCounterStore {
    fn increment(&self, scope: &str, window: Duration) -> Result<u64, CounterError> {
        self.check_reachable()?;
        self.inner.increment(scope, window)
    }

    fn get(&self, scope: &str, window: Duration) -> Result<u64, CounterError> {
        self.check_reachable()?;
        self.inner.get(scope, window)
    }
}

#[derive(Debug, Clone)]
enum ValidatorMode {
    /// Delegate to the real schema validator
    Schema,
    /// Always return a valid report
    Accept,
    /// Always return a content rejection with this detail
    Reject(String),
    /// The validator itself fails
    Fail(String),
}

/// Scriptable validation stage.
#[derive(Debug)]
pub struct MockValidator {
    mode: Mutex<ValidatorMode>,
    schema: SchemaValidator,
    calls: AtomicU64,
}

impl MockValidator {
    /// Validator that accepts every signal.
    pub fn accepting() -> Self {
        Self::with_mode(ValidatorMode::Accept)
    }

    /// Validator applying the real schema and content rules.
    pub fn schema() -> Self {
        Self::with_mode(ValidatorMode::Schema)
    }

    /// Validator rejecting every signal with the given detail.
    pub fn rejecting(detail: impl Into<String>) -> Self {
        Self::with_mode(ValidatorMode::Reject(detail.into()))
    }

    /// Validator that fails outright, as if its backend were down.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(ValidatorMode::Fail(message.into()))
    }

    fn with_mode(mode: ValidatorMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            schema: SchemaValidator::new(),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of validate calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Validator for MockValidator {
    fn validate(&self, signal: &Signal) -> Result<ValidationReport, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.mode).clone() {
            ValidatorMode::Schema => Ok(self.schema.validate(signal)),
            ValidatorMode::Accept => Ok(ValidationReport::default()),
            ValidatorMode::Reject(detail) => {
                let mut report = ValidationReport::default();
                report.errors.push(detail);
                Ok(report)
            }
            ValidatorMode::Fail(message) => Err(StageError::new(message)),
        }
    }
}

/// Scriptable transcription stage.
#[derive(Debug)]
pub struct MockTranscriber {
    result: Mutex<Result<String, String>>,
    calls: AtomicU64,
}

impl MockTranscriber {
    /// Transcriber returning a fixed transcript.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Ok(text.into())),
            calls: AtomicU64::new(0),
        }
    }

    /// Transcriber that fails every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Err(message.into())),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of transcribe calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _media: &MediaRef) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*lock(&self.result) {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(StageError::new(message.clone())),
        }
    }
}

/// Scriptable processing stage.
///
/// Fails the first `fail_times` calls and succeeds afterwards, or fails
/// every call when constructed with [`MockProcessor::always_failing`].
#[derive(Debug)]
pub struct MockProcessor {
    remaining_failures: AtomicU64,
    always_fail: AtomicBool,
    failure_message: String,
    calls: AtomicU64,
    transcripts: Mutex<Vec<Option<String>>>,
}

impl MockProcessor {
    /// Processor that succeeds on every call.
    pub fn succeeding() -> Self {
        Self::fail_times(0, "")
    }

    /// Processor failing the first `n` calls with `message`, then
    /// succeeding.
    pub fn fail_times(n: u64, message: impl Into<String>) -> Self {
        Self {
            remaining_failures: AtomicU64::new(n),
            always_fail: AtomicBool::new(false),
            failure_message: message.into(),
            calls: AtomicU64::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Processor failing every call with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        let processor = Self::fail_times(0, message);
        processor.always_fail.store(true, Ordering::SeqCst);
        processor
    }

    /// Number of process calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transcripts seen per call, in order.
    pub fn transcripts(&self) -> Vec<Option<String>> {
        lock(&self.transcripts).clone()
    }
}

impl Processor for MockProcessor {
    fn process(&self, _signal: &Signal, transcript: Option<&str>) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.transcripts).push(transcript.map(str::to_string));

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(StageError::new(self.failure_message.clone()));
        }
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StageError::new(self.failure_message.clone()));
        }
        Ok(())
    }
}
