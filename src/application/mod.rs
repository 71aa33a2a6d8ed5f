//! Application layer: pipeline orchestration and its ports.
//!
//! This layer owns the kernel, the circuit breaker registry, the retry
//! throttle, the error aggregator, and the metrics. It depends on the
//! domain layer and on the port traits in [`ports`]; concrete adapters
//! live in the infrastructure layer.

pub mod aggregator;
pub mod circuit_breaker;
pub mod config;
pub mod kernel;
pub mod metrics;
pub mod ports;
pub mod throttle;
