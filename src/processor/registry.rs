//! Processor registry.
//!
//! # Responsibilities
//! - Hold at most one processor instance per backend type
//! - Enforce administrative enable/disable
//! - Resolve capability extensions (crypto, subscription, customer)
//! - Pick a single processor for a request by preference, currency and priority
//!
//! # Thread Safety
//! Instances live behind a `RwLock`; the selection config lives in an
//! `ArcSwap` so it can be replaced without blocking lookups. Lock guards are
//! never held across an `.await`: callers snapshot the `Arc`s they need first.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// Re-export RegistryConfig from config module to avoid duplication
pub use crate::config::schema::RegistryConfig;

use crate::processor::error::{PaymentError, Result};
use crate::processor::traits::{
    supports_currency, CryptoProcessor, CustomerProcessor, PaymentProcessor,
    SubscriptionProcessor,
};
use crate::processor::types::{BackendType, PaymentRequest};

/// Crypto backends tried, in order, when the default crypto backend is unusable.
const CRYPTO_FALLBACK: [&str; 3] = [BackendType::MPC, BackendType::ETHEREUM, BackendType::BITCOIN];

/// Concurrency-safe map from backend type to processor instance.
pub struct Registry {
    processors: RwLock<HashMap<BackendType, Arc<dyn PaymentProcessor>>>,
    config: ArcSwap<RegistryConfig>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Register a processor, replacing any instance of the same type.
    pub fn register(&self, processor: Arc<dyn PaymentProcessor>) {
        let backend = processor.backend_type();
        let mut processors = self.processors.write().unwrap_or_else(|e| e.into_inner());
        if processors.insert(backend.clone(), processor).is_some() {
            tracing::info!(backend = %backend, "Replaced registered processor");
        } else {
            tracing::debug!(backend = %backend, "Registered processor");
        }
    }

    /// Remove a processor. Returns the removed instance, if any.
    pub fn unregister(&self, backend: &BackendType) -> Option<Arc<dyn PaymentProcessor>> {
        let mut processors = self.processors.write().unwrap_or_else(|e| e.into_inner());
        processors.remove(backend)
    }

    /// Look up a processor by type.
    ///
    /// Disabled takes precedence over not-registered.
    pub fn get(&self, backend: &BackendType) -> Result<Arc<dyn PaymentProcessor>> {
        if self.config.load().is_disabled(backend) {
            return Err(PaymentError::Disabled(backend.clone()));
        }
        let processors = self.processors.read().unwrap_or_else(|e| e.into_inner());
        processors
            .get(backend)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(backend.clone()))
    }

    pub fn get_crypto(&self, backend: &BackendType) -> Result<Arc<dyn CryptoProcessor>> {
        self.get(backend)?
            .as_crypto()
            .ok_or_else(|| PaymentError::UnsupportedCapability {
                backend: backend.clone(),
                capability: "crypto operations",
            })
    }

    pub fn get_subscription(
        &self,
        backend: &BackendType,
    ) -> Result<Arc<dyn SubscriptionProcessor>> {
        self.get(backend)?
            .as_subscription()
            .ok_or_else(|| PaymentError::UnsupportedCapability {
                backend: backend.clone(),
                capability: "subscriptions",
            })
    }

    pub fn get_customer(&self, backend: &BackendType) -> Result<Arc<dyn CustomerProcessor>> {
        self.get(backend)?
            .as_customer()
            .ok_or_else(|| PaymentError::UnsupportedCapability {
                backend: backend.clone(),
                capability: "customer management",
            })
    }

    /// Pick a single processor for `req`.
    ///
    /// Order: explicit preference, crypto default, crypto fallbacks, fiat priority.
    pub async fn select_processor(&self, req: &PaymentRequest) -> Result<Arc<dyn PaymentProcessor>> {
        let config = self.config.load_full();
        let processors = self.snapshot();

        let usable = |backend: &BackendType| -> Option<Arc<dyn PaymentProcessor>> {
            if config.is_disabled(backend) {
                return None;
            }
            processors.get(backend).cloned()
        };

        if let Some(pref) = req.preferred_backend() {
            if let Some(p) = usable(&pref) {
                if p.is_available().await {
                    tracing::debug!(backend = %pref, "Selected preferred processor");
                    return Ok(p);
                }
            }
        }

        if req.currency.is_crypto() {
            if let Some(p) = usable(&config.default_crypto_processor) {
                if p.is_available().await {
                    return Ok(p);
                }
            }
            for name in CRYPTO_FALLBACK {
                let backend = BackendType::from(name);
                if let Some(p) = usable(&backend) {
                    if p.is_available().await && supports_currency(p.as_ref(), &req.currency) {
                        return Ok(p);
                    }
                }
            }
        }

        for backend in &config.processor_priority {
            if let Some(p) = usable(backend) {
                if p.is_available().await && supports_currency(p.as_ref(), &req.currency) {
                    return Ok(p);
                }
            }
        }

        Err(PaymentError::NoProcessorAvailable(format!(
            "no processor available for currency {}",
            req.currency
        )))
    }

    /// Pick the first subscription-capable processor in priority order.
    pub async fn select_subscription_processor(
        &self,
        req: &PaymentRequest,
    ) -> Result<Arc<dyn SubscriptionProcessor>> {
        let config = self.config.load_full();
        let processors = self.snapshot();

        for backend in &config.processor_priority {
            if config.is_disabled(backend) {
                continue;
            }
            let Some(p) = processors.get(backend) else {
                continue;
            };
            if !p.is_available().await || !supports_currency(p.as_ref(), &req.currency) {
                continue;
            }
            if let Some(sp) = p.clone().as_subscription() {
                return Ok(sp);
            }
        }

        Err(PaymentError::NoProcessorAvailable(format!(
            "no subscription processor available for currency {}",
            req.currency
        )))
    }

    /// All enabled processors that report themselves available.
    pub async fn available(&self) -> Vec<Arc<dyn PaymentProcessor>> {
        let config = self.config.load_full();
        let mut result = Vec::new();
        for (backend, p) in self.snapshot() {
            if !config.is_disabled(&backend) && p.is_available().await {
                result.push(p);
            }
        }
        result
    }

    /// Registered backend types, sorted.
    pub fn list_types(&self) -> Vec<BackendType> {
        let processors = self.processors.read().unwrap_or_else(|e| e.into_inner());
        let mut types: Vec<_> = processors.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn config(&self) -> Arc<RegistryConfig> {
        self.config.load_full()
    }

    /// Replace the selection configuration.
    pub fn set_config(&self, config: RegistryConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn disable_processor(&self, backend: &BackendType) {
        self.config.rcu(|current| {
            let mut next = RegistryConfig::clone(current);
            next.disabled_processors.insert(backend.clone());
            next
        });
        tracing::warn!(backend = %backend, "Processor disabled");
    }

    pub fn enable_processor(&self, backend: &BackendType) {
        self.config.rcu(|current| {
            let mut next = RegistryConfig::clone(current);
            next.disabled_processors.remove(backend);
            next
        });
        tracing::info!(backend = %backend, "Processor enabled");
    }

    fn snapshot(&self) -> HashMap<BackendType, Arc<dyn PaymentProcessor>> {
        self.processors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Process-wide registry for the application boundary.
///
/// Library code takes an `Arc<Registry>` explicitly; this exists for the
/// outermost layer that has nowhere else to keep one.
pub mod global {
    use super::*;
    use std::sync::OnceLock;

    static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

    pub fn registry() -> Arc<Registry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Registry::default()))
            .clone()
    }

    pub fn register(processor: Arc<dyn PaymentProcessor>) {
        registry().register(processor);
    }

    pub fn get(backend: &BackendType) -> Result<Arc<dyn PaymentProcessor>> {
        registry().get(backend)
    }
}
