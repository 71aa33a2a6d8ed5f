//! PII redaction pipeline.
//!
//! Each redactor is an independently testable pure transformation registered
//! under a stable name. A [`RedactionPipeline`] holds an ordered subset of
//! redactors resolved from configuration at construction time; requesting an
//! unknown name is a configuration error, never a silent skip.
//!
//! ## Guarantees
//!
//! - **Idempotent**: redacting already-redacted text yields the same text.
//!   Placeholder tokens contain no digits, `@`, or colons, so no built-in
//!   pattern can match inside them.
//! - **Total**: empty input returns unchanged.
//! - **Ordered**: redactors run in the configured order. Order matters where
//!   patterns overlap; with the default order a card-shaped digit run inside
//!   an address is consumed by the `credit_card` redactor before the
//!   `address` redactor sees the text (see tests).

use regex::Regex;
use std::fmt;

/// Replacement rule: one compiled pattern and its placeholder token.
struct Rule {
    pattern: Regex,
    placeholder: &'static str,
}

/// A named redactor applying one or more replacement rules.
pub struct Redactor {
    name: &'static str,
    rules: Vec<Rule>,
}

impl Redactor {
    /// Stable registry name of this redactor.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply this redactor's rules in order.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            out = rule.pattern.replace_all(&out, rule.placeholder).into_owned();
        }
        out
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor").field("name", &self.name).finish()
    }
}

/// Default redactor names, in application order.
pub const DEFAULT_REDACTORS: [&str; 6] = ["email", "phone", "ssn", "credit_card", "ip", "address"];

/// Error raised when the configuration names a redactor that is not
/// registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRedactor(pub String);

impl fmt::Display for UnknownRedactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown redactor '{}'", self.0)
    }
}

impl std::error::Error for UnknownRedactor {}

/// Build a redactor by registry name.
///
/// Patterns are static and known-good; compilation cannot fail at runtime.
fn build_redactor(name: &str) -> Option<Redactor> {
    let rules = match name {
        "email" => vec![Rule {
            pattern: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            placeholder: "[REDACTED-EMAIL]",
        }],
        "phone" => vec![
            // US/Canada format, optional +1 country code
            Rule {
                pattern: Regex::new(r"\b(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
                    .unwrap(),
                placeholder: "[REDACTED-PHONE]",
            },
            // International format
            Rule {
                pattern: Regex::new(r"\+\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}\b")
                    .unwrap(),
                placeholder: "[REDACTED-PHONE]",
            },
        ],
        "ssn" => vec![
            Rule {
                pattern: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
                placeholder: "[REDACTED-SSN]",
            },
            Rule {
                pattern: Regex::new(r"\b\d{9}\b").unwrap(),
                placeholder: "[REDACTED-SSN]",
            },
        ],
        "credit_card" => vec![Rule {
            pattern: Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").unwrap(),
            placeholder: "[REDACTED-CARD]",
        }],
        "ip" => vec![
            Rule {
                pattern: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(),
                placeholder: "[REDACTED-IP]",
            },
            // Full IPv6
            Rule {
                pattern: Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b").unwrap(),
                placeholder: "[REDACTED-IP6]",
            },
            // Compressed IPv6 with `::` elision
            Rule {
                pattern: Regex::new(
                    r"\b(?:[0-9a-fA-F]{1,4}:){1,7}:(?:[0-9a-fA-F]{1,4}(?::[0-9a-fA-F]{1,4}){0,6})?",
                )
                .unwrap(),
                placeholder: "[REDACTED-IP6]",
            },
            // Loopback literal. No leading \b: there is no word boundary
            // between whitespace and ':'.
            Rule {
                pattern: Regex::new(r"::1\b").unwrap(),
                placeholder: "[REDACTED-IP6]",
            },
        ],
        "address" => vec![Rule {
            pattern: Regex::new(
                r"(?i)\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl)\b",
            )
            .unwrap(),
            placeholder: "[REDACTED-ADDRESS]",
        }],
        _ => return None,
    };

    // `name` is validated above; intern to the registry's static spelling
    let name = DEFAULT_REDACTORS
        .iter()
        .find(|n| **n == name)
        .copied()
        .unwrap_or("custom");

    Some(Redactor { name, rules })
}

/// Ordered, configurable set of redactors.
#[derive(Debug)]
pub struct RedactionPipeline {
    redactors: Vec<Redactor>,
}

impl RedactionPipeline {
    /// Build a pipeline from an ordered list of redactor names.
    ///
    /// # Errors
    /// Returns [`UnknownRedactor`] if any name is not registered. This is a
    /// configuration error surfaced at startup.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownRedactor> {
        let mut redactors = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let redactor =
                build_redactor(name).ok_or_else(|| UnknownRedactor(name.to_string()))?;
            redactors.push(redactor);
        }
        Ok(Self { redactors })
    }

    /// Build a pipeline with every built-in redactor, in default order.
    pub fn with_defaults() -> Self {
        Self::new(&DEFAULT_REDACTORS).unwrap_or(Self { redactors: vec![] })
    }

    /// Names of the enabled redactors, in application order.
    pub fn enabled(&self) -> Vec<&'static str> {
        self.redactors.iter().map(Redactor::name).collect()
    }

    /// Apply the configured redactors in order.
    ///
    /// Empty input returns unchanged without raising.
    pub fn redact(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut out = text.to_string();
        for redactor in &self.redactors {
            out = redactor.apply(&out);
        }
        out
    }
}

impl Default for RedactionPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> RedactionPipeline {
        RedactionPipeline::with_defaults()
    }

    #[test]
    fn test_email_redaction() {
        let out = pipeline().redact("contact a@b.com or ops.team@example.co.uk now");
        assert_eq!(out, "contact [REDACTED-EMAIL] or [REDACTED-EMAIL] now");
    }

    #[test]
    fn test_phone_redaction() {
        let out = pipeline().redact("call 555-123-4567 or +1 555.123.4567");
        assert!(out.contains("[REDACTED-PHONE]"));
        assert!(!out.contains("555-123-4567"));
        assert!(!out.contains("555.123.4567"));
    }

    #[test]
    fn test_international_phone() {
        let out = pipeline().redact("reach +44 20 7946 0958 today");
        assert!(out.contains("[REDACTED-PHONE]"), "got: {out}");
        assert!(!out.contains("7946"));
    }

    #[test]
    fn test_ssn_redaction() {
        let out = pipeline().redact("ssn 123-45-6789 and bare 123456789");
        assert_eq!(out, "ssn [REDACTED-SSN] and bare [REDACTED-SSN]");
    }

    #[test]
    fn test_credit_card_redaction() {
        let out = pipeline().redact("card 4111-1111-1111-1111 charged");
        assert_eq!(out, "card [REDACTED-CARD] charged");
        let out = pipeline().redact("card 4111 1111 1111 1111 charged");
        assert_eq!(out, "card [REDACTED-CARD] charged");
    }

    #[test]
    fn test_ipv4_redaction() {
        let out = pipeline().redact("from 192.168.1.100 and 10.0.0.1");
        assert_eq!(out, "from [REDACTED-IP] and [REDACTED-IP]");
    }

    #[test]
    fn test_ipv6_full() {
        let out = pipeline().redact("src 2001:0db8:85a3:0000:0000:8a2e:0370:7334 seen");
        assert_eq!(out, "src [REDACTED-IP6] seen");
    }

    #[test]
    fn test_ipv6_compressed() {
        let out = pipeline().redact("src 2001:db8::1 seen");
        assert_eq!(out, "src [REDACTED-IP6] seen");
        let out = pipeline().redact("src fe80::1ff:fe23:4567:890a seen");
        assert_eq!(out, "src [REDACTED-IP6] seen");
    }

    #[test]
    fn test_ipv6_loopback() {
        let out = pipeline().redact("bound to ::1 locally");
        assert_eq!(out, "bound to [REDACTED-IP6] locally");
    }

    #[test]
    fn test_address_redaction() {
        let out = pipeline().redact("lives at 123 Main Street in town");
        assert_eq!(out, "lives at [REDACTED-ADDRESS] in town");
        let out = pipeline().redact("office: 4 Elm Grove Avenue");
        assert_eq!(out, "office: [REDACTED-ADDRESS]");
    }

    #[test]
    fn test_idempotent() {
        let p = pipeline();
        let inputs = [
            "a@b.com 555-123-4567 123-45-6789 4111-1111-1111-1111 10.0.0.1 ::1 99 Oak Lane",
            "no pii here at all",
            "",
        ];
        for input in inputs {
            let once = p.redact(input);
            let twice = p.redact(&once);
            assert_eq!(once, twice, "not idempotent for input: {input}");
        }
    }

    #[test]
    fn test_empty_input_unchanged() {
        assert_eq!(pipeline().redact(""), "");
    }

    #[test]
    fn test_unknown_redactor_is_config_error() {
        let err = RedactionPipeline::new(&["email", "dna"]).unwrap_err();
        assert_eq!(err, UnknownRedactor("dna".to_string()));
        assert!(err.to_string().contains("dna"));
    }

    #[test]
    fn test_subset_respects_configuration() {
        let p = RedactionPipeline::new(&["email"]).unwrap();
        let out = p.redact("a@b.com at 555-123-4567");
        assert_eq!(out, "[REDACTED-EMAIL] at 555-123-4567");
    }

    #[test]
    fn test_cross_pattern_interference_card_in_address() {
        // A card-shaped digit run at the head of an address is consumed by
        // the credit_card redactor first; the address pattern then no longer
        // matches. Documented ordering behavior.
        let out = pipeline().redact("4111 1111 1111 1111 Elm Street");
        assert_eq!(out, "[REDACTED-CARD] Elm Street");
    }

    #[test]
    fn test_order_is_configuration_order() {
        // With address first, the address redactor wins over the bare-digit
        // SSN rule for the street number.
        let p = RedactionPipeline::new(&["address", "ssn"]).unwrap();
        let out = p.redact("123 Main Street");
        assert_eq!(out, "[REDACTED-ADDRESS]");
    }

    #[test]
    fn test_placeholders_not_rematched() {
        let p = pipeline();
        let out = p.redact("[REDACTED-EMAIL] [REDACTED-IP6] [REDACTED-CARD]");
        assert_eq!(out, "[REDACTED-EMAIL] [REDACTED-IP6] [REDACTED-CARD]");
    }
}
