//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::load_balancer::Strategy;
use crate::processor::{BackendType, Currency};
use crate::resilience::CircuitBreakerConfig;

/// Root configuration for the payment gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Single-processor selection used outside the router.
    pub registry: RegistryConfig,

    /// Strategy, backend set and breaker tuning for the router.
    pub router: RouterConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// In-memory backends to register at startup.
    pub sandbox: Vec<SandboxConfig>,
}

/// Registry selection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Backend for fiat payments without an explicit preference.
    pub default_fiat_processor: BackendType,

    /// Backend tried first for crypto currencies.
    pub default_crypto_processor: BackendType,

    /// Fiat selection order.
    pub processor_priority: Vec<BackendType>,

    /// Backends that lookups must refuse.
    pub disabled_processors: HashSet<BackendType>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_fiat_processor: BackendType::from(BackendType::SQUARE),
            default_crypto_processor: BackendType::from(BackendType::MPC),
            processor_priority: [
                BackendType::STRIPE,
                BackendType::SQUARE,
                BackendType::ADYEN,
                BackendType::PAYPAL,
                BackendType::BRAINTREE,
                BackendType::RECURLY,
                BackendType::LEMONSQUEEZY,
                BackendType::MPC,
                BackendType::ETHEREUM,
                BackendType::BITCOIN,
            ]
            .into_iter()
            .map(BackendType::from)
            .collect(),
            disabled_processors: HashSet::new(),
        }
    }
}

impl RegistryConfig {
    pub fn is_disabled(&self, backend: &BackendType) -> bool {
        self.disabled_processors.contains(backend)
    }
}

/// Router configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Candidate ordering algorithm.
    pub strategy: Strategy,

    /// Backend tried first by the primary-fallback and currency strategies.
    pub primary: Option<BackendType>,

    /// Backends the router may use, in preference order.
    pub processors: Vec<BackendType>,

    /// Lowercase currency code to preferred backend.
    pub currency_map: HashMap<String, BackendType>,

    /// Relative weights for the weighted strategy (missing or <= 0 means 1).
    pub weights: HashMap<BackendType, i64>,

    /// Extra attempts after the first (0 = try every candidate).
    pub max_retries: u32,

    /// Breaker tuning shared by every backend.
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// An in-memory backend definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    /// Backend type the sandbox registers as.
    pub backend: BackendType,

    /// Currencies accepted by the sandbox.
    #[serde(default = "default_currencies")]
    pub currencies: Vec<Currency>,

    #[serde(default = "default_true")]
    pub available: bool,

    /// Return an error from every charge/authorize.
    #[serde(default)]
    pub fail_charges: bool,

    /// Return `success=false` from every charge/authorize.
    #[serde(default)]
    pub decline_charges: bool,

    /// Shared secret accepted as the webhook signature.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Expose crypto/subscription/customer capabilities.
    #[serde(default = "default_true")]
    pub extensions: bool,
}

fn default_currencies() -> Vec<Currency> {
    vec![Currency::new("usd")]
}

fn default_true() -> bool {
    true
}
