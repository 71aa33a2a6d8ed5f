//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the signal
//! processing kernel:
//! - Signal records and terminal processing results
//! - PII redaction pipeline
//! - Schema validation rules (required fields, forbidden phrases, PII detection)
//!
//! All types in this layer are pure and easily testable.

pub mod redaction;
pub mod signal;
pub mod validation;
