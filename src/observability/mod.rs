//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, registry and breakers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr, plain or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - Nothing is recorded unless the binary installs a recorder

pub mod logging;
pub mod metrics;
