//! Payment routing and resilience layer.
//!
//! One capability contract over heterogeneous payment backends, a composite
//! router that picks backends per call by strategy, per-backend circuit
//! breakers, and follow-up operations routed back to the originating backend
//! by a prefixed transaction id.

// Core subsystems
pub mod config;
pub mod processor;
pub mod routing;

// Traffic management
pub mod load_balancer;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

// In-memory backend
pub mod sandbox;

pub use config::schema::GatewayConfig;
pub use processor::{PaymentError, PaymentProcessor, Registry};
pub use routing::PaymentRouter;
