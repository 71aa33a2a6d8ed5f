//! In-process windowed counter store.
//!
//! Counters live in a sharded concurrent map keyed by scope. Each scope
//! holds the instant its current window opened and a count; expiry is lazy,
//! evaluated against the injected clock on access. The window is armed by
//! the first increment after it opened (or after the previous window
//! expired), so the ceiling resets exactly one window length later.
//!
//! This store is both the default backend for single-process deployments
//! and the transparent fallback the throttle degrades to when a shared
//! store is unreachable.

use crate::application::ports::{Clock, CounterError, CounterStore};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    opened_at: Instant,
    count: u64,
}

/// Thread-safe windowed counters backed by DashMap.
///
/// DashMap provides lock-free reads and fine-grained locking for writes,
/// so concurrent throttle checks across services do not contend on a
/// single lock.
pub struct InMemoryCounterStore {
    slots: DashMap<String, WindowSlot>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for InMemoryCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCounterStore")
            .field("scopes", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryCounterStore {
    /// Create a store reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            clock,
        }
    }

    /// Number of scopes ever touched (including expired windows).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no scope has been touched yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop all counters.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Drop scopes whose window expired, bounding memory for long-running
    /// processes with many one-off service names.
    pub fn evict_expired(&self, window: Duration) {
        let now = self.clock.now();
        self.slots
            .retain(|_, slot| now.saturating_duration_since(slot.opened_at) < window);
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, scope: &str, window: Duration) -> Result<u64, CounterError> {
        let now = self.clock.now();
        let mut slot = self
            .slots
            .entry(scope.to_string())
            .or_insert(WindowSlot {
                opened_at: now,
                count: 0,
            });
        if now.saturating_duration_since(slot.opened_at) >= window {
            slot.opened_at = now;
            slot.count = 0;
        }
        slot.count += 1;
        Ok(slot.count)
    }

    fn get(&self, scope: &str, window: Duration) -> Result<u64, CounterError> {
        let now = self.clock.now();
        let count = match self.slots.get(scope) {
            Some(slot) if now.saturating_duration_since(slot.opened_at) < window => slot.count,
            _ => 0,
        };
        Ok(count)
    }
}
