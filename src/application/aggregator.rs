//! Bounded error aggregation with vault overflow.
//!
//! The aggregator collects failure context from the kernel. When the buffer
//! reaches capacity it is flushed synchronously to the vault and an
//! `errors_flushed_to_vault` audit event is emitted, so no failure is ever
//! dropped between the kernel and durable storage.
//!
//! The aggregator is a construct-once service injected into the kernel, not
//! a process-wide singleton; tests substitute in-memory doubles for the
//! vault and audit sink.

use crate::application::ports::{AuditEvent, AuditSink, Vault};
use crate::domain::signal::Stage;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

/// One aggregated failure. All free text is redacted before it reaches the
/// aggregator.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    /// Signal the failure belongs to
    pub signal_id: String,
    /// Incident correlation identifier
    pub incident_id: String,
    /// Stage that failed, when attributable
    pub stage: Option<Stage>,
    /// Redacted failure detail
    pub detail: String,
    /// Capture time
    pub timestamp: SystemTime,
}

/// Bounded, thread-safe error buffer with overflow flush to the vault.
#[derive(Debug)]
pub struct ErrorAggregator {
    entries: Mutex<Vec<ErrorEntry>>,
    capacity: usize,
    vault: Arc<dyn Vault>,
    audit: Arc<dyn AuditSink>,
}

impl ErrorAggregator {
    /// Create an aggregator flushing to `vault` when `capacity` is reached.
    pub fn new(capacity: usize, vault: Arc<dyn Vault>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            vault,
            audit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ErrorEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record one failure. Flushes to the vault if the buffer is full.
    pub fn record(&self, entry: ErrorEntry) {
        let flush = {
            let mut entries = self.lock();
            entries.push(entry);
            entries.len() >= self.capacity
        };
        if flush {
            self.flush();
        }
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Flush all buffered entries to the vault.
    ///
    /// A vault failure keeps the entries buffered and is logged; it never
    /// propagates to the kernel's caller.
    pub fn flush(&self) {
        let drained: Vec<ErrorEntry> = {
            let mut entries = self.lock();
            std::mem::take(&mut *entries)
        };
        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        let doc = render_entries(&drained);

        match self.vault.deny(&doc, "aggregated signal processing errors") {
            Ok(vault_id) => {
                let event = AuditEvent {
                    timestamp: SystemTime::now(),
                    event_type: "errors_flushed_to_vault",
                    signal_id: String::new(),
                    incident_id: String::new(),
                    stage: None,
                    status: None,
                    attempt_count: 0,
                    detail: format!("flushed {count} errors to vault {vault_id}"),
                };
                if let Err(e) = self.audit.append(event) {
                    tracing::warn!(error = %e, "audit append failed for vault flush");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, count, "vault flush failed, re-buffering entries");
                let mut entries = self.lock();
                // Re-buffer in original order ahead of anything recorded
                // while the flush was in flight
                let newer = std::mem::take(&mut *entries);
                *entries = drained;
                entries.extend(newer);
            }
        }
    }
}

fn render_entries(entries: &[ErrorEntry]) -> String {
    let mut doc = String::new();
    for entry in entries {
        let stage = entry.stage.map(|s| s.name()).unwrap_or("-");
        doc.push_str(&format!(
            "signal={} incident={} stage={} detail={}\n",
            entry.signal_id, entry.incident_id, stage, entry.detail
        ));
    }
    doc
}
