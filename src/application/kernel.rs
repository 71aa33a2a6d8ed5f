//! Signal processing kernel.
//!
//! Orchestrates the pipeline for one signal: throttle check, validation,
//! optional transcription, threshold evaluation, and processing with
//! retries. Each stage is wrapped by its circuit breaker, the retry throttle
//! is consulted before every attempt, and every free-text field passes
//! through the redaction pipeline before it leaves the kernel (audit
//! entries, aggregated errors, result detail).
//!
//! Failures inside a stage are converted into terminal statuses at the stage
//! boundary; they never propagate out of [`SignalKernel::process`]. A
//! failing audit sink or aggregator is logged and never prevents the kernel
//! from returning a terminal result.

use crate::application::aggregator::{ErrorAggregator, ErrorEntry};
use crate::application::circuit_breaker::BreakerRegistry;
use crate::application::config::KernelConfig;
use crate::application::metrics::KernelMetrics;
use crate::application::ports::{
    AuditEvent, AuditSink, Clock, ConfigSource, Processor, Transcriber, Validator,
};
use crate::application::throttle::{RetryThrottle, ThrottleSettings};
use crate::domain::redaction::{RedactionPipeline, UnknownRedactor};
use crate::domain::signal::{ProcessingResult, ProcessingStatus, Signal, Stage};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Error raised while building a kernel.
#[derive(Debug)]
pub enum BuildError {
    /// The configured redactor list names an unregistered redactor
    UnknownRedactor(UnknownRedactor),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnknownRedactor(e) => {
                write!(f, "invalid redaction configuration: {e}")
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<UnknownRedactor> for BuildError {
    fn from(e: UnknownRedactor) -> Self {
        BuildError::UnknownRedactor(e)
    }
}

/// Builder for [`SignalKernel`].
pub struct SignalKernelBuilder {
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    throttle: RetryThrottle,
    validator: Arc<dyn Validator>,
    transcriber: Arc<dyn Transcriber>,
    processor: Arc<dyn Processor>,
    audit: Arc<dyn AuditSink>,
    aggregator: Arc<ErrorAggregator>,
}

impl SignalKernelBuilder {
    /// Finish building, validating the redaction configuration.
    ///
    /// # Errors
    /// Returns [`BuildError::UnknownRedactor`] if the configured redactor
    /// list names a redactor that is not registered. This surfaces
    /// misconfiguration at startup instead of silently skipping redactors.
    pub fn build(self) -> Result<SignalKernel, BuildError> {
        let config = self.config.snapshot();
        let redaction = RedactionPipeline::new(&config.enabled_redactors)?;
        Ok(SignalKernel {
            config: self.config,
            breakers: BreakerRegistry::new(Arc::clone(&self.clock)),
            throttle: self.throttle,
            validator: self.validator,
            transcriber: self.transcriber,
            processor: self.processor,
            audit: self.audit,
            aggregator: self.aggregator,
            metrics: KernelMetrics::new(),
            startup_redaction: redaction,
        })
    }
}

/// The signal processing kernel.
///
/// Safe for concurrent invocation: per-signal state is local to each call,
/// and the shared breaker/throttle tables use locks scoped to their keys.
pub struct SignalKernel {
    config: Arc<dyn ConfigSource>,
    breakers: BreakerRegistry,
    throttle: RetryThrottle,
    validator: Arc<dyn Validator>,
    transcriber: Arc<dyn Transcriber>,
    processor: Arc<dyn Processor>,
    audit: Arc<dyn AuditSink>,
    aggregator: Arc<ErrorAggregator>,
    metrics: KernelMetrics,
    /// Pipeline validated at startup; fallback if a hot-reloaded redactor
    /// list turns out to be invalid
    startup_redaction: RedactionPipeline,
}

impl fmt::Debug for SignalKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalKernel")
            .field("breakers", &self.breakers.len())
            .finish_non_exhaustive()
    }
}

impl SignalKernel {
    /// Start building a kernel from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn builder(
        config: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
        throttle: RetryThrottle,
        validator: Arc<dyn Validator>,
        transcriber: Arc<dyn Transcriber>,
        processor: Arc<dyn Processor>,
        audit: Arc<dyn AuditSink>,
        aggregator: Arc<ErrorAggregator>,
    ) -> SignalKernelBuilder {
        SignalKernelBuilder {
            config,
            clock,
            throttle,
            validator,
            transcriber,
            processor,
            audit,
            aggregator,
        }
    }

    /// Pipeline metrics handle.
    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    /// Breaker table, for operational inspection.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Process one signal through the complete pipeline.
    ///
    /// Every invocation produces exactly one terminal [`ProcessingResult`].
    pub fn process(&self, signal: Signal) -> ProcessingResult {
        // Configuration is re-read per invocation; hot-reload is external
        let config = self.config.snapshot();
        let settings = ThrottleSettings::from(&config);
        let redaction = self.redaction_for(&config);

        let mut signal = signal;
        if signal.signal_id.is_empty() {
            signal.signal_id = Uuid::new_v4().to_string();
        }
        let incident_id = Uuid::new_v4().to_string();

        let ctx = InvocationContext {
            kernel: self,
            signal: &signal,
            incident_id: &incident_id,
            redaction: &redaction,
        };

        ctx.audit(
            "signal_received",
            None,
            None,
            0,
            format!("priority={} service={}", signal.priority, signal.service),
        );

        // Step 1: throttle check, before any stage runs
        let verdict = self.throttle.check_detailed(&signal.service, &settings);
        if !verdict.is_admitted() {
            self.metrics.record_throttle_rejection();
            return ctx.finish(ProcessingStatus::Throttled, 0, verdict.reason(), None, None);
        }

        // Step 2: validation, breaker-wrapped
        let breaker = self.breakers.breaker(
            Stage::Validation,
            &signal.service,
            &config.breaker_for(Stage::Validation),
        );
        if !breaker.allow() {
            self.metrics.record_breaker_rejection();
            return ctx.finish(
                ProcessingStatus::Denied,
                0,
                "circuit open",
                Some(Stage::Validation),
                Some("validation circuit open".to_string()),
            );
        }
        match self.validator.validate(&signal) {
            Ok(report) if report.is_valid() => {
                breaker.record_success();
                let mut detail = String::from("validation passed");
                if !report.pii_detected.is_empty() {
                    detail.push_str(&format!("; pii detected: {}", report.pii_detected.join(",")));
                }
                ctx.audit("signal_validated", Some(Stage::Validation), None, 0, detail);
            }
            Ok(report) => {
                // Content rejection: the validator itself worked
                breaker.record_success();
                return ctx.finish(
                    ProcessingStatus::Denied,
                    0,
                    "validation failed",
                    Some(Stage::Validation),
                    Some(report.failure_detail()),
                );
            }
            Err(e) => {
                breaker.record_failure();
                return ctx.finish(
                    ProcessingStatus::Denied,
                    0,
                    "validation failed",
                    Some(Stage::Validation),
                    Some(e.message().to_string()),
                );
            }
        }

        // Step 3: transcription, only for media that needs it. Failures are
        // non-fatal: the pipeline continues without a transcript.
        let transcript = self.transcribe(&ctx, &signal, &config);

        // Step 4: threshold evaluation
        if let Some(score) = signal.score {
            if score < config.score_threshold {
                ctx.audit(
                    "signal_ignored",
                    None,
                    None,
                    0,
                    format!("score {score} below threshold {}", config.score_threshold),
                );
                return ctx.finish(ProcessingStatus::Ignored, 0, "below threshold", None, None);
            }
        }

        // Step 5: processing with retries and backoff
        let max_attempts = config.per_service_retry_ceiling.max(1);
        let breaker = self.breakers.breaker(
            Stage::Processing,
            &signal.service,
            &config.breaker_for(Stage::Processing),
        );
        let mut attempt: u32 = 0;
        loop {
            // Both throttle tiers are consulted before every attempt. The
            // slot is claimed by the increment itself, so concurrent signals
            // cannot race past the ceiling.
            let verdict = self.throttle.try_acquire(&signal.service, &settings);
            if !verdict.is_admitted() {
                self.metrics.record_throttle_rejection();
                return ctx.finish(
                    ProcessingStatus::Throttled,
                    attempt,
                    verdict.reason(),
                    Some(Stage::Processing),
                    None,
                );
            }
            if !breaker.allow() {
                self.metrics.record_breaker_rejection();
                return ctx.finish(
                    ProcessingStatus::Denied,
                    attempt,
                    "circuit open",
                    Some(Stage::Processing),
                    Some("processing circuit open".to_string()),
                );
            }

            attempt += 1;

            match self.processor.process(&signal, transcript.as_deref()) {
                Ok(()) => {
                    breaker.record_success();
                    ctx.audit(
                        "signal_processed",
                        Some(Stage::Processing),
                        None,
                        attempt,
                        "processing successful".to_string(),
                    );
                    return ctx.finish(ProcessingStatus::Processed, attempt, "processed", None, None);
                }
                Err(e) => {
                    breaker.record_failure();
                    ctx.audit(
                        "signal_processing_retry",
                        Some(Stage::Processing),
                        None,
                        attempt,
                        format!("attempt {attempt}/{max_attempts}: {}", e.message()),
                    );
                    if attempt >= max_attempts {
                        return ctx.finish(
                            ProcessingStatus::Failed,
                            attempt,
                            "max retries exceeded",
                            Some(Stage::Processing),
                            Some(e.message().to_string()),
                        );
                    }
                    // Backoff blocks only this signal's thread, never the
                    // shared throttle or breaker state
                    std::thread::sleep(self.throttle.backoff_delay(attempt, &settings));
                }
            }
        }
    }

    /// Process a batch of signals, one terminal result each.
    pub fn process_batch(&self, signals: Vec<Signal>) -> Vec<ProcessingResult> {
        signals.into_iter().map(|s| self.process(s)).collect()
    }

    fn transcribe(
        &self,
        ctx: &InvocationContext<'_>,
        signal: &Signal,
        config: &KernelConfig,
    ) -> Option<String> {
        let media = match &signal.media {
            Some(media) if media.media_type.needs_transcription() => media,
            _ => {
                // Explicit skip event so audit consumers can distinguish
                // "didn't need transcription" from "transcription failed"
                ctx.audit(
                    "transcription_skipped",
                    Some(Stage::Transcription),
                    None,
                    0,
                    "no transcribable media present".to_string(),
                );
                return None;
            }
        };

        let breaker = self.breakers.breaker(
            Stage::Transcription,
            &signal.service,
            &config.breaker_for(Stage::Transcription),
        );
        if !breaker.allow() {
            self.metrics.record_breaker_rejection();
            ctx.audit(
                "transcription_skipped",
                Some(Stage::Transcription),
                None,
                0,
                "transcription circuit open".to_string(),
            );
            return None;
        }
        match self.transcriber.transcribe(media) {
            Ok(text) => {
                breaker.record_success();
                // Transcription can surface forbidden content the payload
                // validation never saw; screen it before it reaches the
                // processor
                let screened = signal.clone().with_field("transcript", text.as_str());
                let report = match self.validator.validate(&screened) {
                    Ok(report) => report,
                    Err(e) => {
                        // Screening backend failure is non-fatal here; the
                        // payload itself already passed validation
                        ctx.aggregate(Some(Stage::Transcription), e.message());
                        return Some(text);
                    }
                };
                if !report.is_valid() {
                    let detail = report.failure_detail();
                    ctx.aggregate(Some(Stage::Transcription), &detail);
                    ctx.audit(
                        "transcript_content_flagged",
                        Some(Stage::Transcription),
                        None,
                        0,
                        format!("transcript withheld: {detail}"),
                    );
                    return None;
                }
                ctx.audit(
                    "signal_transcribed",
                    Some(Stage::Transcription),
                    None,
                    0,
                    "media transcription completed".to_string(),
                );
                Some(text)
            }
            Err(e) => {
                breaker.record_failure();
                ctx.aggregate(Some(Stage::Transcription), e.message());
                ctx.audit(
                    "transcription_failed",
                    Some(Stage::Transcription),
                    None,
                    0,
                    e.message().to_string(),
                );
                None
            }
        }
    }

    fn redaction_for(&self, config: &KernelConfig) -> RedactionPipeline {
        match RedactionPipeline::new(&config.enabled_redactors) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                tracing::warn!(error = %e, "invalid redactor list in current config, using startup set");
                match RedactionPipeline::new(&self.startup_redaction.enabled()) {
                    Ok(pipeline) => pipeline,
                    Err(_) => RedactionPipeline::with_defaults(),
                }
            }
        }
    }
}

/// Per-invocation helpers carrying signal identity and the redaction
/// pipeline applied to everything leaving the kernel.
struct InvocationContext<'a> {
    kernel: &'a SignalKernel,
    signal: &'a Signal,
    incident_id: &'a str,
    redaction: &'a RedactionPipeline,
}

impl InvocationContext<'_> {
    fn audit(
        &self,
        event_type: &'static str,
        stage: Option<Stage>,
        status: Option<ProcessingStatus>,
        attempt_count: u32,
        detail: String,
    ) {
        let event = AuditEvent {
            timestamp: SystemTime::now(),
            event_type,
            signal_id: self.signal.signal_id.clone(),
            incident_id: self.incident_id.to_string(),
            stage,
            status,
            attempt_count,
            detail: self.redaction.redact(&detail),
        };
        if let Err(e) = self.kernel.audit.append(event) {
            tracing::warn!(error = %e, signal_id = %self.signal.signal_id, "audit append failed");
        }
    }

    fn aggregate(&self, stage: Option<Stage>, detail: &str) {
        self.kernel.aggregator.record(ErrorEntry {
            signal_id: self.signal.signal_id.clone(),
            incident_id: self.incident_id.to_string(),
            stage,
            detail: self.redaction.redact(detail),
            timestamp: SystemTime::now(),
        });
    }

    /// Record the terminal status: one audit entry, metrics, and (for
    /// `Failed`/`Denied`) a synchronous hand-off to the error aggregator.
    fn finish(
        &self,
        status: ProcessingStatus,
        attempt_count: u32,
        reason: &str,
        stage: Option<Stage>,
        error_detail: Option<String>,
    ) -> ProcessingResult {
        let redacted_detail = error_detail.map(|d| self.redaction.redact(&d));

        if matches!(status, ProcessingStatus::Failed | ProcessingStatus::Denied) {
            let payload = self.redaction.redact(&self.signal.payload_text());
            let detail = match &redacted_detail {
                Some(d) => format!("{reason}: {d}; payload: {payload}"),
                None => format!("{reason}; payload: {payload}"),
            };
            self.kernel.aggregator.record(ErrorEntry {
                signal_id: self.signal.signal_id.clone(),
                incident_id: self.incident_id.to_string(),
                stage,
                detail,
                timestamp: SystemTime::now(),
            });
        }

        let event_type = match status {
            ProcessingStatus::Processed => "signal_completed",
            ProcessingStatus::Denied => "signal_denied",
            ProcessingStatus::Failed => "signal_failed",
            ProcessingStatus::Throttled => "signal_throttled",
            ProcessingStatus::Ignored => "signal_ignored_terminal",
        };
        // The terminal entry carries a redacted snippet of the signal
        // content so auditors can review what was handled without reading
        // raw payloads
        let snippet = self.redaction.redact(&self.signal.payload_text());
        let mut detail = match &redacted_detail {
            Some(d) => format!("{reason}: {d}"),
            None => reason.to_string(),
        };
        if !snippet.is_empty() {
            detail.push_str("; content: ");
            detail.push_str(&snippet);
        }
        self.audit(event_type, stage, Some(status), attempt_count, detail);

        self.kernel.metrics.record_status(status);

        ProcessingResult {
            status,
            signal_id: self.signal.signal_id.clone(),
            service: self.signal.service.clone(),
            incident_id: self.incident_id.to_string(),
            attempt_count,
            reason: Some(reason.to_string()),
            error_detail: redacted_detail,
        }
    }
}
