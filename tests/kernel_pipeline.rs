use std::sync::Arc;
use std::time::{Duration, Instant};

use signal_kernel::infrastructure::mocks::{
    MemoryAuditLog, MemoryVault, MockClock, MockProcessor, MockTranscriber, MockValidator,
};
use signal_kernel::{
    ErrorAggregator, InMemoryCounterStore, KernelConfig, MediaRef, MediaType, ProcessingStatus,
    RetryThrottle, SchemaValidator, Signal, SignalKernel, StaticConfig,
};

#[allow(dead_code)]
struct Harness {
    kernel: SignalKernel,
    audit: Arc<MemoryAuditLog>,
    vault: Arc<MemoryVault>,
    aggregator: Arc<ErrorAggregator>,
    clock: MockClock,
}

/// Shrink the backoff cap so retry tests run instantly.
fn fast(mut config: KernelConfig) -> KernelConfig {
    config.retry_backoff_max = Duration::from_millis(1);
    config
}

fn harness(
    config: KernelConfig,
    validator: Arc<MockValidator>,
    transcriber: Arc<MockTranscriber>,
    processor: Arc<MockProcessor>,
) -> Harness {
    let clock = MockClock::new(Instant::now());
    let audit = Arc::new(MemoryAuditLog::new());
    let vault = Arc::new(MemoryVault::new());
    let aggregator = Arc::new(ErrorAggregator::new(
        config.aggregator_capacity,
        vault.clone(),
        audit.clone(),
    ));
    let throttle = RetryThrottle::local_only(Arc::new(InMemoryCounterStore::new(Arc::new(
        clock.clone(),
    ))));
    let kernel = SignalKernel::builder(
        Arc::new(StaticConfig::new(config)),
        Arc::new(clock.clone()),
        throttle,
        validator,
        transcriber,
        processor,
        audit.clone(),
        aggregator.clone(),
    )
    .build()
    .expect("kernel builds with default redactors");
    Harness {
        kernel,
        audit,
        vault,
        aggregator,
        clock,
    }
}

#[test]
fn test_happy_path_is_processed() {
    let processor = Arc::new(MockProcessor::succeeding());
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        processor.clone(),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "routine status update"));

    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(result.attempt_count, 1);
    assert!(!result.signal_id.is_empty());
    assert!(!result.incident_id.is_empty());
    assert_eq!(processor.calls(), 1);

    let types: Vec<&str> = h.audit.events().iter().map(|e| e.event_type).collect();
    assert!(types.contains(&"signal_received"));
    assert!(types.contains(&"signal_validated"));
    assert!(types.contains(&"transcription_skipped"));
    assert!(types.contains(&"signal_processed"));
    assert!(types.contains(&"signal_completed"));

    assert_eq!(h.kernel.metrics().snapshot().processed, 1);
}

#[test]
fn test_content_rejection_is_denied_without_invoking_processor() {
    let processor = Arc::new(MockProcessor::succeeding());
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        processor.clone(),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "please DROP TABLE users"));

    assert_eq!(result.status, ProcessingStatus::Denied);
    assert_eq!(result.reason.as_deref(), Some("validation failed"));
    assert!(result
        .error_detail
        .as_deref()
        .unwrap_or_default()
        .contains("DROP TABLE"));
    assert_eq!(processor.calls(), 0);
    assert_eq!(h.aggregator.len(), 1);
    assert_eq!(h.audit.events_of("signal_denied").len(), 1);
}

#[test]
fn test_validator_failure_is_denied() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::failing("validation backend down")),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "hello"));

    assert_eq!(result.status, ProcessingStatus::Denied);
    assert_eq!(result.reason.as_deref(), Some("validation failed"));
    assert!(result
        .error_detail
        .as_deref()
        .unwrap_or_default()
        .contains("backend down"));
}

#[test]
fn test_low_score_is_ignored() {
    let processor = Arc::new(MockProcessor::succeeding());
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        processor.clone(),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "weak signal")
            .with_score(0.2),
    );

    assert_eq!(result.status, ProcessingStatus::Ignored);
    assert_eq!(result.reason.as_deref(), Some("below threshold"));
    assert_eq!(processor.calls(), 0);
    assert_eq!(h.kernel.metrics().snapshot().ignored, 1);
}

#[test]
fn test_score_at_threshold_is_processed() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "strong signal")
            .with_score(0.85),
    );

    assert_eq!(result.status, ProcessingStatus::Processed);
}

#[test]
fn test_retry_then_success() {
    let processor = Arc::new(MockProcessor::fail_times(1, "downstream 503"));
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        processor.clone(),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "retry me"));

    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(result.attempt_count, 2);
    assert_eq!(processor.calls(), 2);
    assert_eq!(h.audit.events_of("signal_processing_retry").len(), 1);
}

#[test]
fn test_retry_exhaustion_is_failed() {
    let processor = Arc::new(MockProcessor::always_failing("downstream 503"));
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        processor.clone(),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "doomed"));

    assert_eq!(result.status, ProcessingStatus::Failed);
    assert_eq!(result.reason.as_deref(), Some("max retries exceeded"));
    assert_eq!(result.attempt_count, 3);
    assert_eq!(processor.calls(), 3);
    assert_eq!(h.audit.events_of("signal_failed").len(), 1);
    assert_eq!(h.kernel.metrics().snapshot().failed, 1);
}

#[test]
fn test_transcript_reaches_processor() {
    let processor = Arc::new(MockProcessor::succeeding());
    let transcriber = Arc::new(MockTranscriber::fixed("mayday mayday"));
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        transcriber.clone(),
        processor.clone(),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "voice report attached")
            .with_media(MediaRef {
                media_type: MediaType::Audio,
                asset_path: "assets/report.wav".to_string(),
            }),
    );

    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(transcriber.calls(), 1);
    assert_eq!(
        processor.transcripts(),
        vec![Some("mayday mayday".to_string())]
    );
    assert_eq!(h.audit.events_of("signal_transcribed").len(), 1);
}

#[test]
fn test_image_media_skips_transcription() {
    let transcriber = Arc::new(MockTranscriber::fixed("should not run"));
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        transcriber.clone(),
        Arc::new(MockProcessor::succeeding()),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "photo attached")
            .with_media(MediaRef {
                media_type: MediaType::Image,
                asset_path: "assets/photo.jpg".to_string(),
            }),
    );

    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(transcriber.calls(), 0);
    assert_eq!(h.audit.events_of("transcription_skipped").len(), 1);
}

#[test]
fn test_transcription_failure_is_non_fatal() {
    let processor = Arc::new(MockProcessor::succeeding());
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::failing("codec error")),
        processor.clone(),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "voice report attached")
            .with_media(MediaRef {
                media_type: MediaType::Audio,
                asset_path: "assets/report.wav".to_string(),
            }),
    );

    // Pipeline continues without a transcript
    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(processor.transcripts(), vec![None]);
    assert_eq!(h.audit.events_of("transcription_failed").len(), 1);
    assert_eq!(h.aggregator.len(), 1);
}

#[test]
fn test_flagged_transcript_is_withheld_from_processor() {
    let processor = Arc::new(MockProcessor::succeeding());
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("operator said DROP TABLE users")),
        processor.clone(),
    );

    let result = h.kernel.process(
        Signal::new("relay")
            .with_field("text", "voice report attached")
            .with_media(MediaRef {
                media_type: MediaType::Audio,
                asset_path: "assets/report.wav".to_string(),
            }),
    );

    // Forbidden content surfaced by transcription never reaches the
    // processor, but the signal itself still completes
    assert_eq!(result.status, ProcessingStatus::Processed);
    assert_eq!(processor.transcripts(), vec![None]);
    assert_eq!(h.audit.events_of("transcript_content_flagged").len(), 1);
    assert_eq!(h.audit.events_of("signal_transcribed").len(), 0);
    assert_eq!(h.aggregator.len(), 1);
}

#[test]
fn test_shipped_validator_wires_in_directly() {
    let clock = MockClock::new(Instant::now());
    let audit = Arc::new(MemoryAuditLog::new());
    let vault = Arc::new(MemoryVault::new());
    let aggregator = Arc::new(ErrorAggregator::new(100, vault, audit.clone()));
    let throttle = RetryThrottle::local_only(Arc::new(InMemoryCounterStore::new(Arc::new(
        clock.clone(),
    ))));
    let kernel = SignalKernel::builder(
        Arc::new(StaticConfig::new(fast(KernelConfig::default()))),
        Arc::new(clock),
        throttle,
        Arc::new(SchemaValidator::new()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
        audit,
        aggregator,
    )
    .build()
    .unwrap();

    let ok = kernel.process(Signal::new("relay").with_field("text", "routine status update"));
    assert_eq!(ok.status, ProcessingStatus::Processed);

    let denied =
        kernel.process(Signal::new("relay").with_field("text", "please DROP TABLE users"));
    assert_eq!(denied.status, ProcessingStatus::Denied);
    assert_eq!(denied.reason.as_deref(), Some("validation failed"));
}

#[test]
fn test_blank_signal_id_is_assigned() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
    );

    let mut signal = Signal::new("relay").with_field("text", "hello");
    signal.signal_id = String::new();

    let result = h.kernel.process(signal);
    assert!(!result.signal_id.is_empty());
}

#[test]
fn test_failed_payload_reaches_vault_redacted() {
    let mut config = fast(KernelConfig::default());
    config.aggregator_capacity = 1;
    let h = harness(
        config,
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::always_failing("downstream 503")),
    );

    let result = h.kernel.process(
        Signal::new("relay").with_field("contact", "reach ops@example.com at 10.0.0.1"),
    );

    assert_eq!(result.status, ProcessingStatus::Failed);
    let stored = h.vault.entries();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].doc.contains("[REDACTED-EMAIL]"));
    assert!(stored[0].doc.contains("[REDACTED-IP]"));
    assert!(!stored[0].doc.contains("ops@example.com"));
    assert_eq!(h.audit.events_of("errors_flushed_to_vault").len(), 1);
}

#[test]
fn test_audit_failures_never_block_result() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
    );

    h.audit.set_failing(true);
    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "hello"));

    assert_eq!(result.status, ProcessingStatus::Processed);
    assert!(h.audit.events().is_empty());
}

#[test]
fn test_incident_id_stable_across_events_of_one_invocation() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::fail_times(1, "downstream 503")),
    );

    let result = h
        .kernel
        .process(Signal::new("relay").with_field("text", "retry me"));

    let events = h.audit.events();
    assert!(events.len() >= 4);
    for event in &events {
        assert_eq!(event.incident_id, result.incident_id);
        assert_eq!(event.signal_id, result.signal_id);
    }
}

#[test]
fn test_process_batch_yields_one_result_per_signal() {
    let h = harness(
        fast(KernelConfig::default()),
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
    );

    let results = h.kernel.process_batch(vec![
        Signal::new("relay").with_field("text", "one"),
        Signal::new("relay").with_field("text", "please DROP TABLE users"),
        Signal::new("relay").with_field("text", "three").with_score(0.1),
    ]);

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, ProcessingStatus::Processed);
    assert_eq!(results[1].status, ProcessingStatus::Denied);
    assert_eq!(results[2].status, ProcessingStatus::Ignored);
}

#[test]
fn test_config_updates_apply_to_next_invocation() {
    let config = StaticConfig::new(fast(KernelConfig::default()));
    let clock = MockClock::new(Instant::now());
    let audit = Arc::new(MemoryAuditLog::new());
    let vault = Arc::new(MemoryVault::new());
    let aggregator = Arc::new(ErrorAggregator::new(100, vault, audit.clone()));
    let throttle = RetryThrottle::local_only(Arc::new(InMemoryCounterStore::new(Arc::new(
        clock.clone(),
    ))));
    let kernel = SignalKernel::builder(
        Arc::new(config.clone()),
        Arc::new(clock),
        throttle,
        Arc::new(MockValidator::schema()),
        Arc::new(MockTranscriber::fixed("unused")),
        Arc::new(MockProcessor::succeeding()),
        audit,
        aggregator,
    )
    .build()
    .unwrap();

    let borderline = Signal::new("relay")
        .with_field("text", "borderline")
        .with_score(0.5);
    assert_eq!(
        kernel.process(borderline.clone()).status,
        ProcessingStatus::Ignored
    );

    let mut updated = fast(KernelConfig::default());
    updated.score_threshold = 0.4;
    config.update(updated);

    assert_eq!(
        kernel.process(borderline).status,
        ProcessingStatus::Processed
    );
}
