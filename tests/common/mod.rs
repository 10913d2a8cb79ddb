//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use payrouter::config::RouterConfig;
use payrouter::load_balancer::Strategy;
use payrouter::processor::{
    BackendType, Cents, Currency, PaymentError, PaymentProcessor, PaymentRequest, PaymentResult,
    RefundRequest, RefundResult, Registry, Result, Transaction, WebhookEvent,
};
use payrouter::resilience::CircuitBreakerConfig;
use payrouter::PaymentRouter;

/// A programmable backend.
///
/// Charges succeed with id `tx_<backend>` unless switched to failing,
/// declining or returning an empty id. Refunds return `re_<raw id>`, declined
/// when declining. Every call is counted.
pub struct MockProcessor {
    backend: BackendType,
    currencies: Vec<Currency>,
    delay: Option<Duration>,
    available: AtomicBool,
    failing: AtomicBool,
    declining: AtomicBool,
    empty_ids: AtomicBool,
    empty_refund_ids: AtomicBool,
    accepts_webhooks: bool,
    known: Mutex<HashSet<String>>,
    pub charges: AtomicU32,
    pub authorizations: AtomicU32,
    pub captures: AtomicU32,
    pub refunds: AtomicU32,
    pub lookups: AtomicU32,
    pub webhooks: AtomicU32,
    pub last_capture: Mutex<Option<(String, Cents)>>,
    pub last_refund: Mutex<Option<RefundRequest>>,
}

impl MockProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            backend: BackendType::from(name),
            currencies: vec![Currency::new("usd")],
            delay: None,
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            declining: AtomicBool::new(false),
            empty_ids: AtomicBool::new(false),
            empty_refund_ids: AtomicBool::new(false),
            accepts_webhooks: false,
            known: Mutex::new(HashSet::new()),
            charges: AtomicU32::new(0),
            authorizations: AtomicU32::new(0),
            captures: AtomicU32::new(0),
            refunds: AtomicU32::new(0),
            lookups: AtomicU32::new(0),
            webhooks: AtomicU32::new(0),
            last_capture: Mutex::new(None),
            last_refund: Mutex::new(None),
        }
    }

    pub fn with_currencies(mut self, codes: &[&str]) -> Self {
        self.currencies = codes.iter().map(Currency::new).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn accepting_webhooks(mut self) -> Self {
        self.accepts_webhooks = true;
        self
    }

    /// Make `raw_id` visible to `get_transaction`.
    pub fn with_transaction(self, raw_id: &str) -> Self {
        self.known.lock().unwrap().insert(raw_id.to_string());
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn declining(self) -> Self {
        self.declining.store(true, Ordering::SeqCst);
        self
    }

    pub fn returning_empty_ids(self) -> Self {
        self.empty_ids.store(true, Ordering::SeqCst);
        self
    }

    pub fn returning_empty_refund_ids(self) -> Self {
        self.empty_refund_ids.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn charge_calls(&self) -> u32 {
        self.charges.load(Ordering::SeqCst)
    }

    async fn pay(&self, req: &PaymentRequest) -> Result<PaymentResult> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::backend(
                self.backend.clone(),
                "MOCK_FAILURE",
                format!("{} is down", self.backend),
            ));
        }
        if self.declining.load(Ordering::SeqCst) {
            return Ok(PaymentResult::declined(format!("{} declined", self.backend)));
        }
        if self.empty_ids.load(Ordering::SeqCst) {
            return Ok(PaymentResult::succeeded("", "succeeded"));
        }
        let mut result = PaymentResult::succeeded(format!("tx_{}", self.backend), "succeeded");
        result.fee = Cents(req.amount.0 / 100);
        Ok(result)
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    fn backend_type(&self) -> BackendType {
        self.backend.clone()
    }

    async fn charge(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        self.pay(&req).await
    }

    async fn authorize(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        self.pay(&req).await
    }

    async fn capture(&self, transaction_id: &str, amount: Cents) -> Result<PaymentResult> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        *self.last_capture.lock().unwrap() = Some((transaction_id.to_string(), amount));
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::backend(self.backend.clone(), "MOCK_FAILURE", "capture failed"));
        }
        Ok(PaymentResult::succeeded(transaction_id, "succeeded"))
    }

    async fn refund(&self, req: RefundRequest) -> Result<RefundResult> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        *self.last_refund.lock().unwrap() = Some(req.clone());
        let refund_id = if self.empty_refund_ids.load(Ordering::SeqCst) {
            String::new()
        } else {
            format!("re_{}", req.transaction_id)
        };
        let declined = self.declining.load(Ordering::SeqCst);
        Ok(RefundResult {
            success: !declined,
            refund_id,
            processor_ref: String::new(),
            error_message: declined.then(|| "refund declined".to_string()),
        })
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.known.lock().unwrap().contains(transaction_id) {
            return Err(PaymentError::TransactionNotFound(transaction_id.to_string()));
        }
        Ok(Transaction {
            id: transaction_id.to_string(),
            kind: "charge".into(),
            amount: Cents(1000),
            currency: Currency::new("usd"),
            status: "succeeded".into(),
            ..Default::default()
        })
    }

    async fn validate_webhook(&self, _payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        self.webhooks.fetch_add(1, Ordering::SeqCst);
        if !self.accepts_webhooks || signature.is_empty() {
            return Err(PaymentError::WebhookValidationFailed);
        }
        Ok(WebhookEvent {
            id: format!("evt_{}", self.backend),
            event_type: "charge.succeeded".into(),
            processor: self.backend.clone(),
            data: Default::default(),
            timestamp: 0,
        })
    }

    fn supported_currencies(&self) -> Vec<Currency> {
        self.currencies.clone()
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

pub fn backends(names: &[&str]) -> Vec<BackendType> {
    names.iter().map(|n| BackendType::from(*n)).collect()
}

/// Router config over `names` in order, default breaker.
pub fn router_config(strategy: Strategy, names: &[&str]) -> RouterConfig {
    RouterConfig {
        strategy,
        processors: backends(names),
        ..Default::default()
    }
}

pub fn breaker(threshold: u32, reset: Duration) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: threshold,
        reset_timeout: reset,
        half_open_max: 1,
    }
}

/// Register `mocks` and build a router over `config`.
pub fn setup(mocks: &[Arc<MockProcessor>], config: RouterConfig) -> (Arc<Registry>, PaymentRouter) {
    let registry = Arc::new(Registry::default());
    for mock in mocks {
        registry.register(mock.clone());
    }
    let router = PaymentRouter::new(registry.clone(), config);
    (registry, router)
}
