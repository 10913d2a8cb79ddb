//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Routed attempt against a backend:
//!     → circuit_breaker.rs permit() (skip the backend silently if open)
//!     → delegate call
//!     → permit.success() / permit.failure() (track consecutive failures)
//!     → or the permit drops unsettled (cancelled, or skipped after admission)
//! ```
//!
//! # Design Decisions
//! - One breaker per configured backend, created with the router
//! - No router-side timeouts; deadlines belong to the backend client
//! - No retries against the same backend; failover goes to the next candidate

pub mod circuit_breaker;

pub use circuit_breaker::{
    BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
