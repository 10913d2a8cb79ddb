//! Payment processor subsystem.
//!
//! # Data Flow
//! ```text
//! Backend implementations (card networks, crypto custody, bank wire)
//!     → traits.rs (PaymentProcessor + optional capability traits)
//!     → registry.rs (one instance per BackendType, enable/disable, selection)
//!     → routing::PaymentRouter (strategy-driven delegation)
//! ```
//!
//! # Design Decisions
//! - Registry is constructed explicitly and injected; the global accessor is
//!   a thin convenience for the application boundary
//! - Capability extensions are exposed through `as_*` accessors, not casts
//! - Errors are a closed `thiserror` enum shared with the router

pub mod error;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::{PaymentError, Result};
pub use registry::{Registry, RegistryConfig};
pub use traits::{
    supports_currency, CryptoProcessor, CustomerProcessor, PaymentProcessor,
    SubscriptionProcessor,
};
pub use types::{
    BackendType, Balance, Cents, Currency, Money, PaymentRequest, PaymentResult, RefundRequest,
    RefundResult, Subscription, SubscriptionRequest, SubscriptionUpdate, Transaction,
    WebhookEvent,
};
