//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! charge / authorize (PaymentRequest)
//!     → router.rs validate request
//!     → load_balancer selector (ordered candidates)
//!     → per candidate: breaker allow → registry lookup → availability
//!     → delegate call (in-flight guard held)
//!     → success: id rewritten to "backend:raw" (txid.rs)
//!     → failure: breaker failure, next candidate
//!
//! capture / refund / get_transaction ("backend:raw")
//!     → txid.rs parse
//!     → exact backend, raw id (no failover)
//! ```
//!
//! # Design Decisions
//! - The router implements the same trait as the backends it fronts
//! - Routed ids are self-describing; the router keeps no transaction table
//! - Follow-up operations never fail over: money already moved on one backend

pub mod router;
pub mod txid;

// Re-export RouterConfig from config module to avoid duplication
pub use crate::config::schema::RouterConfig;
pub use router::{BackendStatus, PaymentRouter, ROUTER_BACKEND};
pub use txid::{encode, RoutedId};
