//! In-memory payment backend.
//!
//! # Responsibilities
//! - Implement the full processor contract and all capability extensions
//! - Keep transactions, subscriptions and customers in memory
//! - Let callers inject failures, declines and outages at runtime
//! - Count calls per operation
//!
//! # Design Decisions
//! - No network, no persistence: state lives for the life of the instance
//! - Switches are atomics so a shared `Arc` can be reconfigured mid-test
//! - Webhooks use a shared-secret comparison; there is no real signing

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// Re-export SandboxConfig from config module to avoid duplication
pub use crate::config::schema::SandboxConfig;

use crate::processor::{
    BackendType, Balance, Cents, CryptoProcessor, Currency, CustomerProcessor, PaymentError,
    PaymentProcessor, PaymentRequest, PaymentResult, RefundRequest, RefundResult, Result,
    Subscription, SubscriptionProcessor, SubscriptionRequest, SubscriptionUpdate, Transaction,
    WebhookEvent,
};

/// Percentage part of the fee, in tenths of a percent.
const FEE_PER_MILLE: i64 = 29;
/// Fixed part of the fee, in minor units.
const FEE_FIXED: i64 = 30;
const PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Per-operation call counters.
#[derive(Debug, Default)]
struct Counters {
    charge: AtomicUsize,
    authorize: AtomicUsize,
    capture: AtomicUsize,
    refund: AtomicUsize,
    get_transaction: AtomicUsize,
    validate_webhook: AtomicUsize,
}

/// Point-in-time copy of the call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub charge: usize,
    pub authorize: usize,
    pub capture: usize,
    pub refund: usize,
    pub get_transaction: usize,
    pub validate_webhook: usize,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Map<String, Value>,
}

pub struct SandboxProcessor {
    backend: BackendType,
    currencies: Vec<Currency>,
    extensions: bool,
    webhook_secret: Option<String>,
    available: AtomicBool,
    fail_charges: AtomicBool,
    decline_charges: AtomicBool,
    counters: Counters,
    transactions: DashMap<String, Transaction>,
    subscriptions: DashMap<String, Subscription>,
    customers: DashMap<String, Map<String, Value>>,
}

impl SandboxProcessor {
    pub fn new(backend: impl Into<BackendType>, currencies: Vec<Currency>) -> Self {
        Self {
            backend: backend.into(),
            currencies,
            extensions: true,
            webhook_secret: None,
            available: AtomicBool::new(true),
            fail_charges: AtomicBool::new(false),
            decline_charges: AtomicBool::new(false),
            counters: Counters::default(),
            transactions: DashMap::new(),
            subscriptions: DashMap::new(),
            customers: DashMap::new(),
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        let mut sandbox = Self::new(config.backend.clone(), config.currencies.clone());
        sandbox.extensions = config.extensions;
        sandbox.webhook_secret = config.webhook_secret.clone();
        sandbox.set_available(config.available);
        sandbox.fail_charges(config.fail_charges);
        sandbox.decline_charges(config.decline_charges);
        sandbox
    }

    /// Expose only the base contract.
    pub fn without_extensions(mut self) -> Self {
        self.extensions = false;
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make charge and authorize return an error.
    pub fn fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Make charge and authorize return `success=false`.
    pub fn decline_charges(&self, decline: bool) {
        self.decline_charges.store(decline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            charge: c.charge.load(Ordering::SeqCst),
            authorize: c.authorize.load(Ordering::SeqCst),
            capture: c.capture.load(Ordering::SeqCst),
            refund: c.refund.load(Ordering::SeqCst),
            get_transaction: c.get_transaction.load(Ordering::SeqCst),
            validate_webhook: c.validate_webhook.load(Ordering::SeqCst),
        }
    }

    /// 2.9% plus a fixed 30 minor units; zero-decimal currencies skip the
    /// fixed part. Amounts whose fee would not fit in `i64` are rejected.
    pub fn fee_for(amount: Cents, currency: &Currency) -> Result<Cents> {
        let fixed = if currency.is_zero_decimal() { 0 } else { FEE_FIXED };
        amount
            .0
            .checked_mul(FEE_PER_MILLE)
            .and_then(|v| (v / 1000).checked_add(fixed))
            .map(Cents)
            .ok_or_else(|| {
                PaymentError::InvalidRequest(format!("amount {} is too large to price", amount))
            })
    }

    fn check_currency(&self, currency: &Currency) -> Result<()> {
        if self.currencies.iter().any(|c| c == currency) {
            Ok(())
        } else {
            Err(PaymentError::UnsupportedCurrency(currency.clone()))
        }
    }

    fn new_id(prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }

    async fn create_payment(
        &self,
        req: PaymentRequest,
        kind: &str,
        status: &str,
    ) -> Result<PaymentResult> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(PaymentError::backend(
                self.backend.clone(),
                "SANDBOX_FAILURE",
                "injected failure",
            ));
        }
        if self.decline_charges.load(Ordering::SeqCst) {
            tracing::debug!(backend = %self.backend, "Sandbox declining payment");
            return Ok(PaymentResult::declined("card declined"));
        }
        req.validate()?;
        self.check_currency(&req.currency)?;

        let id = Self::new_id(if kind == "charge" { "ch" } else { "auth" });
        let fee = Self::fee_for(req.amount, &req.currency)?;
        let now = now_secs();
        self.transactions.insert(
            id.clone(),
            Transaction {
                id: id.clone(),
                processor_ref: id.clone(),
                kind: kind.to_string(),
                amount: req.amount,
                currency: req.currency,
                status: status.to_string(),
                fee,
                customer_id: req.customer_id,
                metadata: req.metadata,
                created_at: now,
                updated_at: now,
            },
        );

        let mut result = PaymentResult::succeeded(id.clone(), status);
        result.processor_ref = id;
        result.fee = fee;
        Ok(result)
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Chain served by a crypto currency code.
fn chain_for(currency: &Currency) -> Option<&'static str> {
    match currency.code() {
        "btc" | "xbt" => Some("bitcoin"),
        "eth" | "usdc" | "usdt" => Some("ethereum"),
        "sol" => Some("solana"),
        "matic" => Some("polygon"),
        "avax" => Some("avalanche"),
        "lux" => Some("lux"),
        _ => None,
    }
}

#[async_trait]
impl PaymentProcessor for SandboxProcessor {
    fn backend_type(&self) -> BackendType {
        self.backend.clone()
    }

    async fn charge(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.counters.charge.fetch_add(1, Ordering::SeqCst);
        self.create_payment(req, "charge", "succeeded").await
    }

    async fn authorize(&self, req: PaymentRequest) -> Result<PaymentResult> {
        self.counters.authorize.fetch_add(1, Ordering::SeqCst);
        self.create_payment(req, "authorization", "requires_capture")
            .await
    }

    /// A zero amount captures the full authorization.
    async fn capture(&self, transaction_id: &str, amount: Cents) -> Result<PaymentResult> {
        self.counters.capture.fetch_add(1, Ordering::SeqCst);
        let mut tx = self
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| PaymentError::TransactionNotFound(transaction_id.to_string()))?;

        if tx.status != "requires_capture" {
            return Err(PaymentError::InvalidRequest(format!(
                "transaction {} cannot be captured in status {}",
                transaction_id, tx.status
            )));
        }
        if amount.0 > tx.amount.0 {
            return Err(PaymentError::InvalidRequest(format!(
                "capture amount {} exceeds authorized {}",
                amount, tx.amount
            )));
        }
        if amount.is_positive() {
            tx.fee = Self::fee_for(amount, &tx.currency)?;
            tx.amount = amount;
        }
        tx.status = "succeeded".to_string();
        tx.updated_at = now_secs();

        let mut result = PaymentResult::succeeded(tx.id.clone(), "succeeded");
        result.processor_ref = tx.processor_ref.clone();
        result.fee = tx.fee;
        Ok(result)
    }

    /// A zero amount refunds the full transaction.
    async fn refund(&self, req: RefundRequest) -> Result<RefundResult> {
        self.counters.refund.fetch_add(1, Ordering::SeqCst);
        let (currency, customer_id, amount) = {
            let mut tx = self
                .transactions
                .get_mut(&req.transaction_id)
                .ok_or_else(|| PaymentError::TransactionNotFound(req.transaction_id.clone()))?;

            if tx.status != "succeeded" {
                return Ok(RefundResult {
                    success: false,
                    error_message: Some(format!("transaction is {}", tx.status)),
                    ..Default::default()
                });
            }
            let amount = if req.amount.is_positive() { req.amount } else { tx.amount };
            if amount.0 > tx.amount.0 {
                return Err(PaymentError::InvalidRequest(format!(
                    "refund amount {} exceeds charged {}",
                    amount, tx.amount
                )));
            }
            tx.status = if amount == tx.amount {
                "refunded".to_string()
            } else {
                "partially_refunded".to_string()
            };
            tx.updated_at = now_secs();
            (tx.currency.clone(), tx.customer_id.clone(), amount)
        };

        let refund_id = Self::new_id("re");
        let now = now_secs();
        self.transactions.insert(
            refund_id.clone(),
            Transaction {
                id: refund_id.clone(),
                processor_ref: refund_id.clone(),
                kind: "refund".to_string(),
                amount,
                currency,
                status: "succeeded".to_string(),
                fee: Cents(0),
                customer_id,
                metadata: req.metadata,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(RefundResult {
            success: true,
            refund_id: refund_id.clone(),
            processor_ref: refund_id,
            error_message: None,
        })
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.counters.get_transaction.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .get(transaction_id)
            .map(|tx| tx.clone())
            .ok_or_else(|| PaymentError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Accepts a JSON payload `{"id", "type", "data"}` when `signature`
    /// equals the configured secret.
    async fn validate_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        self.counters.validate_webhook.fetch_add(1, Ordering::SeqCst);
        match &self.webhook_secret {
            Some(secret) if secret == signature => {}
            _ => return Err(PaymentError::WebhookValidationFailed),
        }
        let parsed: WebhookPayload =
            serde_json::from_slice(payload).map_err(|_| PaymentError::WebhookValidationFailed)?;

        Ok(WebhookEvent {
            id: if parsed.id.is_empty() {
                Self::new_id("evt")
            } else {
                parsed.id
            },
            event_type: parsed.event_type,
            processor: self.backend.clone(),
            data: parsed.data,
            timestamp: now_secs(),
        })
    }

    fn supported_currencies(&self) -> Vec<Currency> {
        self.currencies.clone()
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn as_crypto(self: Arc<Self>) -> Option<Arc<dyn CryptoProcessor>> {
        if self.extensions {
            Some(self)
        } else {
            None
        }
    }

    fn as_subscription(self: Arc<Self>) -> Option<Arc<dyn SubscriptionProcessor>> {
        if self.extensions {
            Some(self)
        } else {
            None
        }
    }

    fn as_customer(self: Arc<Self>) -> Option<Arc<dyn CustomerProcessor>> {
        if self.extensions {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl CryptoProcessor for SandboxProcessor {
    async fn generate_address(&self, customer_id: &str, chain: &str) -> Result<String> {
        if !self.supported_chains().iter().any(|c| c == chain) {
            return Err(PaymentError::InvalidRequest(format!(
                "chain {} is not supported",
                chain
            )));
        }
        tracing::debug!(backend = %self.backend, customer_id, chain, "Generated sandbox address");
        Ok(format!("{}_{}", chain, Uuid::new_v4().simple()))
    }

    async fn get_balance(&self, _address: &str, chain: &str) -> Result<Balance> {
        let currency = self
            .currencies
            .iter()
            .find(|c| chain_for(c) == Some(chain))
            .cloned()
            .ok_or_else(|| PaymentError::InvalidRequest(format!("chain {} is not supported", chain)))?;
        Ok(Balance {
            available: Cents(0),
            pending: Cents(0),
            currency,
        })
    }

    async fn estimate_fee(&self, req: &PaymentRequest) -> Result<Cents> {
        self.check_currency(&req.currency)?;
        Self::fee_for(req.amount, &req.currency)
    }

    fn supported_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self
            .currencies
            .iter()
            .filter_map(chain_for)
            .map(str::to_string)
            .collect();
        chains.sort();
        chains.dedup();
        chains
    }
}

#[async_trait]
impl SubscriptionProcessor for SandboxProcessor {
    async fn create_subscription(&self, req: SubscriptionRequest) -> Result<Subscription> {
        if req.customer_id.is_empty() || req.plan_id.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "customer and plan are required".into(),
            ));
        }
        let now = now_secs();
        let trial = i64::from(req.trial_days) * 24 * 60 * 60;
        let sub = Subscription {
            id: Self::new_id("sub"),
            customer_id: req.customer_id,
            plan_id: req.plan_id,
            status: if req.trial_days > 0 { "trialing" } else { "active" }.to_string(),
            current_period_start: now,
            current_period_end: now + trial + PERIOD_SECS,
            cancel_at_period_end: false,
            metadata: req.metadata,
        };
        self.subscriptions.insert(sub.id.clone(), sub.clone());
        Ok(sub)
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription> {
        self.subscriptions
            .get(subscription_id)
            .map(|s| s.clone())
            .ok_or_else(|| PaymentError::TransactionNotFound(subscription_id.to_string()))
    }

    async fn cancel_subscription(&self, subscription_id: &str, immediately: bool) -> Result<()> {
        let mut sub = self
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::TransactionNotFound(subscription_id.to_string()))?;
        if immediately {
            sub.status = "canceled".to_string();
        } else {
            sub.cancel_at_period_end = true;
        }
        Ok(())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        update: SubscriptionUpdate,
    ) -> Result<Subscription> {
        let mut sub = self
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::TransactionNotFound(subscription_id.to_string()))?;
        if let Some(plan_id) = update.plan_id {
            sub.plan_id = plan_id;
        }
        if let Some(cancel) = update.cancel_at_period_end {
            sub.cancel_at_period_end = cancel;
        }
        Ok(sub.clone())
    }

    async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<Subscription>> {
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|s| s.customer_id == customer_id)
            .map(|s| s.clone())
            .collect();
        subs.sort_by_key(|s| s.current_period_start);
        Ok(subs)
    }
}

#[async_trait]
impl CustomerProcessor for SandboxProcessor {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        let id = Self::new_id("cus");
        let mut details = Map::new();
        details.insert("email".into(), Value::from(email));
        details.insert("name".into(), Value::from(name));
        details.insert("metadata".into(), Value::Object(metadata));
        details.insert("paymentMethods".into(), Value::Array(Vec::new()));
        self.customers.insert(id.clone(), details);
        Ok(id)
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Map<String, Value>> {
        self.customers
            .get(customer_id)
            .map(|c| c.clone())
            .ok_or_else(|| PaymentError::InvalidRequest(format!("customer {} not found", customer_id)))
    }

    async fn update_customer(&self, customer_id: &str, updates: Map<String, Value>) -> Result<()> {
        let mut customer = self
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| PaymentError::InvalidRequest(format!("customer {} not found", customer_id)))?;
        customer.extend(updates);
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<()> {
        self.customers
            .remove(customer_id)
            .map(|_| ())
            .ok_or_else(|| PaymentError::InvalidRequest(format!("customer {} not found", customer_id)))
    }

    async fn add_payment_method(&self, customer_id: &str, token: &str) -> Result<String> {
        if token.is_empty() {
            return Err(PaymentError::InvalidRequest("token is required".into()));
        }
        let mut customer = self
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| PaymentError::InvalidRequest(format!("customer {} not found", customer_id)))?;
        let pm_id = Self::new_id("pm");
        if let Some(Value::Array(methods)) = customer.get_mut("paymentMethods") {
            methods.push(Value::from(pm_id.clone()));
        }
        Ok(pm_id)
    }

    async fn remove_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let mut customer = self
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| PaymentError::InvalidRequest(format!("customer {} not found", customer_id)))?;
        if let Some(Value::Array(methods)) = customer.get_mut("paymentMethods") {
            methods.retain(|m| m.as_str() != Some(payment_method_id));
        }
        Ok(())
    }
}
