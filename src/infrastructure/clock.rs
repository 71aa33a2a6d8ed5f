//! Production time source behind the [`Clock`] port.
//!
//! Breaker recovery timeouts and throttle windows are all measured through
//! the port rather than against `Instant::now()` directly, so tests can
//! substitute the controllable clock from `infrastructure::mocks` (behind
//! the `test-helpers` feature) instead of sleeping through real timeouts.

use crate::application::ports::Clock;
use std::time::Instant;

/// Monotonic wall clock; reads `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
