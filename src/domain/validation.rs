//! Schema validation rules for inbound signals.
//!
//! Validation inspects *raw* content: the kernel applies redaction only after
//! validation, because these rules legitimately need to see the very patterns
//! being redacted (PII detection, forbidden phrases).

use crate::domain::signal::Signal;
use regex::Regex;

/// Default forbidden phrases blocked on content grounds.
pub const DEFAULT_FORBIDDEN_PHRASES: [&str; 10] = [
    "DROP DATABASE",
    "DROP TABLE",
    "DELETE FROM",
    "shutdown -h",
    "rm -rf /",
    "exec malicious",
    "eval(",
    "__import__",
    "system(",
    "popen(",
];

/// Outcome of validating one signal.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Hard errors; any entry means the signal is denied
    pub errors: Vec<String>,
    /// Non-fatal findings surfaced for operator visibility
    pub warnings: Vec<String>,
    /// Forbidden phrases that matched
    pub blocked_phrases: Vec<String>,
    /// PII categories detected in the payload
    pub pii_detected: Vec<String>,
}

impl ValidationReport {
    /// Whether the signal passed validation.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Short reason string naming the failing rule, for `error_detail`.
    pub fn failure_detail(&self) -> String {
        self.errors.join("; ")
    }
}

/// Rule-based signal validator.
///
/// Checks required fields, matches forbidden phrases as substrings, and
/// reports detected PII categories as warnings.
#[derive(Debug)]
pub struct SchemaValidator {
    forbidden_phrases: Vec<String>,
    pii_rules: Vec<(&'static str, Regex)>,
}

impl SchemaValidator {
    /// Validator with the default forbidden phrase list.
    pub fn new() -> Self {
        Self::with_forbidden_phrases(DEFAULT_FORBIDDEN_PHRASES.iter().map(|s| s.to_string()))
    }

    /// Validator with a custom forbidden phrase list.
    pub fn with_forbidden_phrases(phrases: impl IntoIterator<Item = String>) -> Self {
        let pii_rules = vec![
            ("ssn", Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()),
            (
                "email",
                Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            ),
            (
                "phone",
                Regex::new(r"\b(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap(),
            ),
            (
                "credit_card",
                Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").unwrap(),
            ),
            (
                "ip_address",
                Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(),
            ),
        ];
        Self {
            forbidden_phrases: phrases.into_iter().collect(),
            pii_rules,
        }
    }

    /// Validate a signal against schema and content rules.
    pub fn validate(&self, signal: &Signal) -> ValidationReport {
        let mut report = ValidationReport::default();

        if signal.service.trim().is_empty() {
            report.errors.push("missing required field: service".to_string());
        }
        if signal.payload.is_empty() && signal.media.is_none() {
            report
                .errors
                .push("signal carries neither payload fields nor media".to_string());
        }
        if let Some(score) = signal.score {
            if !(0.0..=1.0).contains(&score) {
                report
                    .errors
                    .push(format!("score {score} outside valid range 0.0..=1.0"));
            }
        }

        let text = signal.payload_text();
        let lowered = text.to_lowercase();

        for phrase in &self.forbidden_phrases {
            if lowered.contains(&phrase.to_lowercase()) {
                report.blocked_phrases.push(phrase.clone());
                report.errors.push(format!("forbidden phrase: {phrase}"));
            }
        }

        for (category, pattern) in &self.pii_rules {
            if pattern.is_match(&text) {
                report.pii_detected.push((*category).to_string());
                report
                    .warnings
                    .push(format!("PII detected in payload: {category}"));
            }
        }

        report
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}
