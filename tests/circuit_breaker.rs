use std::sync::Arc;
use std::time::{Duration, Instant};

use signal_kernel::infrastructure::mocks::{
    MemoryAuditLog, MemoryVault, MockClock, MockProcessor, MockTranscriber, MockValidator,
};
use signal_kernel::{
    ErrorAggregator, InMemoryCounterStore, KernelConfig, ProcessingStatus, RetryThrottle, Signal,
    SignalKernel, StaticConfig,
};

#[allow(dead_code)]
struct Harness {
    kernel: SignalKernel,
    audit: Arc<MemoryAuditLog>,
    clock: MockClock,
}

/// Processing breaker tuned for fast tests: two failures open the circuit,
/// one trial success closes it, one attempt per signal, no real sleeping.
fn breaker_config() -> KernelConfig {
    let mut config = KernelConfig::default();
    config.per_service_retry_ceiling = 1;
    config.retry_backoff_max = Duration::from_millis(1);
    config.processing_breaker.failure_threshold = 2;
    config.processing_breaker.recovery_timeout = Duration::from_secs(10);
    config.processing_breaker.success_threshold = 1;
    config.validation_breaker.failure_threshold = 2;
    config.validation_breaker.recovery_timeout = Duration::from_secs(10);
    config.validation_breaker.success_threshold = 1;
    config
}

fn harness(
    config: KernelConfig,
    validator: Arc<MockValidator>,
    processor: Arc<MockProcessor>,
) -> Harness {
    let clock = MockClock::new(Instant::now());
    let audit = Arc::new(MemoryAuditLog::new());
    let vault = Arc::new(MemoryVault::new());
    let aggregator = Arc::new(ErrorAggregator::new(
        config.aggregator_capacity,
        vault,
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
        Arc::new(MockTranscriber::fixed("unused")),
        processor,
        audit.clone(),
        aggregator,
    )
    .build()
    .unwrap();
    Harness {
        kernel,
        audit,
        clock,
    }
}

fn signal(service: &str) -> Signal {
    Signal::new(service).with_field("text", "status update")
}

#[test]
fn test_processing_breaker_opens_after_threshold_failures() {
    let processor = Arc::new(MockProcessor::always_failing("downstream 503"));
    let h = harness(
        breaker_config(),
        Arc::new(MockValidator::schema()),
        processor.clone(),
    );

    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Failed
    );
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Failed
    );

    // Circuit is now open: rejected without invoking the processor
    let result = h.kernel.process(signal("relay"));
    assert_eq!(result.status, ProcessingStatus::Denied);
    assert_eq!(result.reason.as_deref(), Some("circuit open"));
    assert_eq!(result.attempt_count, 0);
    assert_eq!(processor.calls(), 2);
    assert_eq!(h.kernel.metrics().snapshot().breaker_rejections, 1);
}

#[test]
fn test_processing_breaker_recovers_after_timeout() {
    let processor = Arc::new(MockProcessor::fail_times(2, "downstream 503"));
    let h = harness(
        breaker_config(),
        Arc::new(MockValidator::schema()),
        processor.clone(),
    );

    // Two failures open the circuit
    h.kernel.process(signal("relay"));
    h.kernel.process(signal("relay"));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );

    // Before the recovery timeout the circuit stays open
    h.clock.advance(Duration::from_secs(9));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );

    // After the timeout a trial call is admitted; its success closes the
    // circuit again
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Processed
    );
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Processed
    );
}

#[test]
fn test_failed_trial_reopens_circuit() {
    let processor = Arc::new(MockProcessor::fail_times(3, "downstream 503"));
    let h = harness(
        breaker_config(),
        Arc::new(MockValidator::schema()),
        processor.clone(),
    );

    h.kernel.process(signal("relay"));
    h.kernel.process(signal("relay"));

    // Trial call fails: straight back to open, full timeout again
    h.clock.advance(Duration::from_secs(10));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Failed
    );
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );

    h.clock.advance(Duration::from_secs(10));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Processed
    );
}

#[test]
fn test_breakers_are_isolated_per_service() {
    let processor = Arc::new(MockProcessor::fail_times(2, "downstream 503"));
    let h = harness(
        breaker_config(),
        Arc::new(MockValidator::schema()),
        processor.clone(),
    );

    // Open the breaker for relay only
    h.kernel.process(signal("relay"));
    h.kernel.process(signal("relay"));
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );

    // beacon has its own breaker and keeps flowing
    assert_eq!(
        h.kernel.process(signal("beacon")).status,
        ProcessingStatus::Processed
    );
}

#[test]
fn test_validation_breaker_trips_on_validator_failures() {
    let validator = Arc::new(MockValidator::failing("validation backend down"));
    let h = harness(
        breaker_config(),
        validator.clone(),
        Arc::new(MockProcessor::succeeding()),
    );

    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );
    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Denied
    );

    let result = h.kernel.process(signal("relay"));
    assert_eq!(result.status, ProcessingStatus::Denied);
    assert_eq!(result.reason.as_deref(), Some("circuit open"));
    assert_eq!(validator.calls(), 2);
}

#[test]
fn test_content_rejections_do_not_trip_validation_breaker() {
    let h = harness(
        breaker_config(),
        Arc::new(MockValidator::schema()),
        Arc::new(MockProcessor::succeeding()),
    );

    // Well past the failure threshold; rejections are successful validator
    // calls, so the circuit stays closed
    for _ in 0..5 {
        let result = h
            .kernel
            .process(Signal::new("relay").with_field("text", "please DROP TABLE users"));
        assert_eq!(result.status, ProcessingStatus::Denied);
        assert_eq!(result.reason.as_deref(), Some("validation failed"));
    }

    assert_eq!(
        h.kernel.process(signal("relay")).status,
        ProcessingStatus::Processed
    );
}
