//! Audit sink emitting structured `tracing` events.
//!
//! Each audit record becomes one event under the `audit` target, so
//! deployments route the trail with a subscriber filter (for example
//! `EnvFilter::new("audit=info")`) to whatever durable backend they use.
//! Details reaching this sink are already redacted.

use crate::application::ports::{AuditError, AuditEvent, AuditSink};

/// Audit log adapter writing through the `tracing` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl TracingAuditLog {
    /// Create a new tracing-backed audit log.
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditLog {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        let stage = event.stage.map(|s| s.name()).unwrap_or("-");
        match event.status {
            Some(status) => {
                tracing::info!(
                    target: "audit",
                    event_type = event.event_type,
                    signal_id = %event.signal_id,
                    incident_id = %event.incident_id,
                    stage,
                    status = %status,
                    attempt_count = event.attempt_count,
                    detail = %event.detail,
                );
            }
            None => {
                tracing::info!(
                    target: "audit",
                    event_type = event.event_type,
                    signal_id = %event.signal_id,
                    incident_id = %event.incident_id,
                    stage,
                    attempt_count = event.attempt_count,
                    detail = %event.detail,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_append_never_fails() {
        let sink = TracingAuditLog::new();
        let event = AuditEvent {
            timestamp: SystemTime::now(),
            event_type: "signal_received",
            signal_id: "sig-1".to_string(),
            incident_id: "inc-1".to_string(),
            stage: None,
            status: None,
            attempt_count: 0,
            detail: "priority=normal service=relay".to_string(),
        };

        assert!(sink.append(event).is_ok());
    }
}
