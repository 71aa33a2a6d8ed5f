//! Mock implementations for testing.
//!
//! This module provides test doubles for the kernel's collaborators and for
//! time, enabling controlled testing of pipeline behavior.

pub mod clock;
pub mod collaborators;

pub use clock::MockClock;
pub use collaborators::{
    FlakyCounterStore, MemoryAuditLog, MemoryVault, MockProcessor, MockTranscriber, MockValidator,
};
