//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → RegistryConfig into the Registry (swappable at runtime)
//!     → RouterConfig into the PaymentRouter (fixed for its lifetime)
//! ```
//!
//! # Design Decisions
//! - Router config is immutable once loaded; changes require a new router
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::ObservabilityConfig;
pub use schema::RegistryConfig;
pub use schema::RouterConfig;
pub use schema::SandboxConfig;
