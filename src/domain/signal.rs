//! Signal records and processing outcomes.
//!
//! A [`Signal`] is the unit of work flowing through the kernel. Every signal
//! that enters the kernel produces exactly one terminal [`ProcessingResult`];
//! partial processing never leaves a signal unrecorded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Priority levels for signals.
///
/// Priority is used only for logging and triage. It never affects throttle
/// or circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPriority {
    Critical,
    High,
    Normal,
    Low,
    Debug,
}

impl Default for SignalPriority {
    fn default() -> Self {
        SignalPriority::Normal
    }
}

impl fmt::Display for SignalPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalPriority::Critical => "critical",
            SignalPriority::High => "high",
            SignalPriority::Normal => "normal",
            SignalPriority::Low => "low",
            SignalPriority::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Media types a signal may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Audio,
    Video,
    Image,
    Document,
}

impl MediaType {
    /// Whether this media type requires transcription before threshold
    /// evaluation.
    pub fn needs_transcription(&self) -> bool {
        matches!(self, MediaType::Audio | MediaType::Video)
    }
}

/// Reference to a media asset carried by a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Kind of media the asset holds
    pub media_type: MediaType,
    /// Opaque locator understood by the transcriber
    pub asset_path: String,
}

/// The unit of work processed by the kernel.
///
/// The payload is immutable once ingested: redaction produces a new sanitized
/// copy rather than mutating fields in place, so audit capture always sees a
/// consistent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique identifier, assigned by the kernel at ingestion
    pub signal_id: String,
    /// Downstream capability this signal targets. Used as the per-service
    /// throttle and circuit breaker key.
    pub service: String,
    /// Free-form fields; values may contain free text subject to redaction
    pub payload: BTreeMap<String, String>,
    /// Optional media reference triggering the transcription stage
    pub media: Option<MediaRef>,
    /// Business score evaluated against the configured threshold
    pub score: Option<f64>,
    /// Priority for logging and triage only
    pub priority: SignalPriority,
}

impl Signal {
    /// Create a signal targeting a service. The kernel assigns `signal_id`
    /// during ingestion; callers normally leave it as created here.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            signal_id: Uuid::new_v4().to_string(),
            service: service.into(),
            payload: BTreeMap::new(),
            media: None,
            score: None,
            priority: SignalPriority::default(),
        }
    }

    /// Add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Attach a media reference.
    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    /// Set the business score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: SignalPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Concatenated free-text view of the payload, used for validation and
    /// (after redaction) for audit snippets.
    pub fn payload_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.payload {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Pipeline stages guarded by circuit breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Transcription,
    Processing,
}

impl Stage {
    /// Stable name used in breaker keys and audit entries.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Transcription => "transcription",
            Stage::Processing => "processing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal status of one kernel invocation.
///
/// Exactly one status applies per invocation; the variants are mutually
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// The business action completed
    Processed,
    /// Rejected by validation rules or an open circuit breaker
    Denied,
    /// Retries exhausted against a failing stage
    Failed,
    /// A retry ceiling was hit before any stage ran
    Throttled,
    /// Valid but below the actionable score threshold; not an error
    Ignored,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Denied => "denied",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Throttled => "throttled",
            ProcessingStatus::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// Outcome of one kernel invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Terminal status; exactly one per signal
    pub status: ProcessingStatus,
    /// Identifier of the processed signal
    pub signal_id: String,
    /// Service the signal targeted
    pub service: String,
    /// Correlation identifier grouping all audit entries for this signal
    pub incident_id: String,
    /// Number of processing attempts made (0 if no stage ran)
    pub attempt_count: u32,
    /// Short machine-readable reason ("circuit open", "validation failed", ...)
    pub reason: Option<String>,
    /// Redacted failure detail; present only for `Failed`/`Denied`
    pub error_detail: Option<String>,
}

impl ProcessingResult {
    /// Whether the signal reached the processor and completed.
    pub fn is_processed(&self) -> bool {
        self.status == ProcessingStatus::Processed
    }
}
