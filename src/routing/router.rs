//! The payment router.
//!
//! # Responsibilities
//! - Present the processor contract over a set of registered backends
//! - Order backends per call with the configured strategy
//! - Gate each attempt with the backend's circuit breaker and track its load
//! - Fail over to the next candidate on error or declined result
//! - Route capture/refund/lookup back to the backend named in the id prefix
//!
//! # Design Decisions
//! - Holds no payment state: only breakers and in-flight counters per backend
//! - Attempts are sequential on the caller's task; nothing is spawned
//! - Routing-level skips (open breaker, unregistered, unavailable) are silent;
//!   only the last delegate failure is surfaced
//! - The breaker permit lives as long as the attempt; an unsettled drop
//!   returns any half-open probe slot

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::RouterConfig;
use crate::load_balancer::pool::SlotTable;
use crate::load_balancer::{
    CandidateSelector, CurrencyBased, LeastLoad, PrimaryFallback, RoundRobin, SelectionContext,
    Strategy, WeightedRandom,
};
use crate::observability::metrics;
use crate::processor::{
    BackendType, Cents, CryptoProcessor, Currency, PaymentError, PaymentProcessor,
    PaymentRequest, PaymentResult, RefundRequest, RefundResult, Registry, Result, Transaction,
    WebhookEvent,
};
use crate::resilience::{BreakerSnapshot, CircuitState};
use crate::routing::txid::{encode, RoutedId};

/// Backend type reported by the router itself.
pub const ROUTER_BACKEND: &str = "router";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaymentOp {
    Charge,
    Authorize,
}

impl PaymentOp {
    fn as_str(self) -> &'static str {
        match self {
            PaymentOp::Charge => "charge",
            PaymentOp::Authorize => "authorize",
        }
    }
}

/// Routing state of one configured backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub backend: BackendType,
    pub registered: bool,
    pub available: bool,
    pub breaker: BreakerSnapshot,
    pub in_flight: usize,
}

/// A `PaymentProcessor` that delegates to registered backends.
pub struct PaymentRouter {
    config: RouterConfig,
    registry: Arc<Registry>,
    slots: SlotTable,
    selector: Box<dyn CandidateSelector>,
    currencies: Vec<Currency>,
}

impl PaymentRouter {
    /// Create a router over `registry`. One breaker and one in-flight counter
    /// are created per entry of `config.processors`.
    pub fn new(registry: Arc<Registry>, config: RouterConfig) -> Self {
        let selector = Self::build_selector(&config, None);
        Self::with_selector(registry, config, selector)
    }

    /// Like [`new`](Self::new) but with a seeded generator for the weighted
    /// strategy, so candidate orderings are reproducible.
    pub fn with_rng_seed(registry: Arc<Registry>, config: RouterConfig, seed: u64) -> Self {
        let selector = Self::build_selector(&config, Some(seed));
        Self::with_selector(registry, config, selector)
    }

    fn with_selector(
        registry: Arc<Registry>,
        mut config: RouterConfig,
        selector: Box<dyn CandidateSelector>,
    ) -> Self {
        config.circuit_breaker = config.circuit_breaker.with_defaults();
        let slots = SlotTable::new(&config.processors, config.circuit_breaker);

        let mut currencies = BTreeSet::new();
        for backend in &config.processors {
            match registry.get(backend) {
                Ok(p) => currencies.extend(p.supported_currencies()),
                Err(e) => {
                    tracing::warn!(backend = %backend, error = %e, "Configured processor not usable at router construction");
                }
            }
        }

        tracing::info!(
            strategy = config.strategy.as_str(),
            processors = slots.len(),
            max_retries = config.max_retries,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "Payment router initialized"
        );

        Self {
            config,
            registry,
            slots,
            selector,
            currencies: currencies.into_iter().collect(),
        }
    }

    fn build_selector(config: &RouterConfig, seed: Option<u64>) -> Box<dyn CandidateSelector> {
        match config.strategy {
            Strategy::PrimaryFallback => Box::new(PrimaryFallback::new()),
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::CurrencyBased => Box::new(CurrencyBased::new(&config.currency_map)),
            Strategy::WeightedRandom => match seed {
                Some(seed) => Box::new(WeightedRandom::with_seed(config.weights.clone(), seed)),
                None => Box::new(WeightedRandom::new(config.weights.clone())),
            },
            Strategy::LeastLoad => Box::new(LeastLoad::new()),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Ordered backends the next routed call for `req` would attempt.
    pub fn candidates(&self, req: &PaymentRequest) -> Vec<BackendType> {
        let ctx = SelectionContext {
            processors: &self.config.processors,
            primary: self.config.primary.as_ref(),
            request: req,
            slots: &self.slots,
        };
        self.selector.candidates(&ctx)
    }

    pub fn breaker_state(&self, backend: &BackendType) -> Option<CircuitState> {
        self.slots.get(backend).map(|s| s.breaker().state())
    }

    pub fn in_flight(&self, backend: &BackendType) -> usize {
        self.slots.in_flight(backend)
    }

    /// Registration, availability, breaker and load of every configured backend.
    pub async fn backend_status(&self) -> Vec<BackendStatus> {
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            let (registered, available) = match self.registry.get(slot.backend()) {
                Ok(p) => (true, p.is_available().await),
                Err(_) => (false, false),
            };
            out.push(BackendStatus {
                backend: slot.backend().clone(),
                registered,
                available,
                breaker: slot.breaker().snapshot(),
                in_flight: slot.in_flight(),
            });
        }
        out
    }

    /// Crypto capability of one registered backend.
    pub fn crypto_for(&self, backend: &BackendType) -> Result<Arc<dyn CryptoProcessor>> {
        self.registry.get_crypto(backend)
    }

    async fn route_payment(&self, op: PaymentOp, req: PaymentRequest) -> Result<PaymentResult> {
        req.validate()?;
        let started = Instant::now();

        let candidates = self.candidates(&req);
        if candidates.is_empty() {
            return Err(PaymentError::NoProcessorAvailable(format!(
                "no processor available for currency {}",
                req.currency
            )));
        }

        let max_attempts = if self.config.max_retries > 0 {
            candidates.len().min(self.config.max_retries as usize + 1)
        } else {
            candidates.len()
        };

        let mut attempts = 0usize;
        let mut last_err: Option<PaymentError> = None;
        let mut last_skip: Option<PaymentError> = None;

        for backend in candidates.iter().take(max_attempts) {
            let slot = self.slots.get(backend);

            // Skips below drop the permit unsettled, handing back any probe slot.
            let permit = match slot {
                Some(slot) => match slot.breaker().permit() {
                    Some(permit) => Some(permit),
                    None => {
                        tracing::debug!(backend = %backend, op = op.as_str(), "Skipping processor: circuit open");
                        metrics::record_attempt(backend.as_str(), "circuit_open");
                        continue;
                    }
                },
                None => None,
            };

            let processor = match self.registry.get(backend) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(backend = %backend, error = %e, "Skipping processor: lookup failed");
                    metrics::record_attempt(backend.as_str(), "unregistered");
                    last_skip = Some(e);
                    continue;
                }
            };

            if !processor.is_available().await {
                tracing::debug!(backend = %backend, "Skipping processor: unavailable");
                metrics::record_attempt(backend.as_str(), "unavailable");
                continue;
            }

            attempts += 1;
            let guard = slot.map(|s| s.track());
            let outcome = match op {
                PaymentOp::Charge => processor.charge(req.clone()).await,
                PaymentOp::Authorize => processor.authorize(req.clone()).await,
            };
            drop(guard);

            let failure = match outcome {
                Ok(result) if result.success && !result.transaction_id.is_empty() => {
                    if let Some(permit) = permit {
                        permit.success();
                    }
                    metrics::record_attempt(backend.as_str(), "success");
                    metrics::record_route_latency(op.as_str(), started);
                    if attempts > 1 {
                        tracing::info!(backend = %backend, attempts, op = op.as_str(), "Payment succeeded after failover");
                    }
                    return Ok(prefix_result(result, backend));
                }
                Ok(result) if result.success => PaymentError::backend(
                    backend.clone(),
                    "MISSING_TRANSACTION_ID",
                    "processor reported success without a transaction id",
                ),
                Ok(result) => PaymentError::backend(
                    backend.clone(),
                    "PAYMENT_FAILED",
                    result
                        .error_message
                        .unwrap_or_else(|| format!("status {}", result.status)),
                ),
                Err(e) => e,
            };

            if let Some(permit) = permit {
                permit.failure();
            }
            metrics::record_attempt(backend.as_str(), "failure");
            if failure.is_retryable() {
                tracing::warn!(
                    backend = %backend,
                    op = op.as_str(),
                    attempt = attempts,
                    code = failure.code(),
                    error = %failure,
                    "Processor attempt failed"
                );
            } else {
                tracing::info!(
                    backend = %backend,
                    op = op.as_str(),
                    attempt = attempts,
                    code = failure.code(),
                    error = %failure,
                    "Processor rejected request"
                );
            }
            last_err = Some(failure);
        }

        metrics::record_route_latency(op.as_str(), started);
        match last_err {
            Some(source) => Err(PaymentError::AllProcessorsFailed {
                attempts,
                source: Box::new(source),
            }),
            None => Err(PaymentError::NoProcessorAvailable(match last_skip {
                Some(e) => format!("no processor could handle the request (last: {})", e),
                None => "no processor could handle the request".to_string(),
            })),
        }
    }

    /// Resolve the exact backend named by a routed id.
    async fn resolve(&self, backend: &BackendType) -> Result<Arc<dyn PaymentProcessor>> {
        let processor = self.registry.get(backend)?;
        if !processor.is_available().await {
            return Err(PaymentError::Unavailable(backend.clone()));
        }
        Ok(processor)
    }

    /// Configured backends in order, registered and available.
    async fn usable_processors(&self) -> Vec<(BackendType, Arc<dyn PaymentProcessor>)> {
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            let Ok(p) = self.registry.get(slot.backend()) else {
                continue;
            };
            if p.is_available().await {
                out.push((slot.backend().clone(), p));
            }
        }
        out
    }
}

/// Rewrite a delegate result's id into routed form.
fn prefix_result(mut result: PaymentResult, backend: &BackendType) -> PaymentResult {
    result.transaction_id = encode(backend, &result.transaction_id);
    result
}

#[async_trait]
impl PaymentProcessor for PaymentRouter {
    fn backend_type(&self) -> BackendType {
        BackendType::from(ROUTER_BACKEND)
    }

    async fn charge(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.route_payment(PaymentOp::Charge, req).await
    }

    async fn authorize(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.route_payment(PaymentOp::Authorize, req).await
    }

    /// `transaction_id` must be routed (`"backend:raw"`); no search is done.
    async fn capture(&self, transaction_id: &str, amount: Cents) -> Result<PaymentResult> {
        let id = RoutedId::parse(transaction_id)?;
        let processor = self.resolve(&id.backend).await?;

        let _guard = self.slots.get(&id.backend).map(|s| s.track());
        let mut result = processor.capture(&id.raw, amount).await?;
        if result.transaction_id.is_empty() {
            result.transaction_id = id.raw.clone();
        }
        tracing::debug!(backend = %id.backend, "Capture routed");
        Ok(prefix_result(result, &id.backend))
    }

    /// `req.transaction_id` must be routed; the backend sees the raw id.
    /// A non-empty refund id is prefixed even on a declined refund.
    async fn refund(&self, mut req: RefundRequest) -> Result<RefundResult> {
        let id = RoutedId::parse(&req.transaction_id)?;
        let processor = self.resolve(&id.backend).await?;

        req.transaction_id = id.raw;
        let _guard = self.slots.get(&id.backend).map(|s| s.track());
        let mut result = processor.refund(req).await?;
        if !result.refund_id.is_empty() {
            result.refund_id = encode(&id.backend, &result.refund_id);
        }
        Ok(result)
    }

    /// Routed ids go straight to their backend; bare ids are looked up on
    /// every configured available backend in order.
    async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        if let Ok(id) = RoutedId::parse(transaction_id) {
            let processor = self.resolve(&id.backend).await?;
            let mut tx = processor.get_transaction(&id.raw).await?;
            if tx.id.is_empty() {
                tx.id = id.raw.clone();
            }
            tx.id = encode(&id.backend, &tx.id);
            return Ok(tx);
        }

        for (backend, processor) in self.usable_processors().await {
            match processor.get_transaction(transaction_id).await {
                Ok(mut tx) => {
                    if tx.id.is_empty() {
                        tx.id = transaction_id.to_string();
                    }
                    tx.id = encode(&backend, &tx.id);
                    return Ok(tx);
                }
                Err(e) => {
                    tracing::debug!(backend = %backend, error = %e, "Transaction lookup missed");
                }
            }
        }
        Err(PaymentError::TransactionNotFound(transaction_id.to_string()))
    }

    /// First configured available backend whose own check accepts the payload.
    async fn validate_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        for (backend, processor) in self.usable_processors().await {
            match processor.validate_webhook(payload, signature).await {
                Ok(event) => {
                    tracing::debug!(backend = %backend, event_type = %event.event_type, "Webhook validated");
                    return Ok(event);
                }
                Err(e) => {
                    tracing::trace!(backend = %backend, error = %e, "Webhook rejected");
                }
            }
        }
        Err(PaymentError::WebhookValidationFailed)
    }

    /// Union of the configured backends' currencies at construction time.
    fn supported_currencies(&self) -> Vec<Currency> {
        self.currencies.clone()
    }

    async fn is_available(&self) -> bool {
        for slot in self.slots.iter() {
            if let Ok(p) = self.registry.get(slot.backend()) {
                if p.is_available().await {
                    return true;
                }
            }
        }
        false
    }
}
