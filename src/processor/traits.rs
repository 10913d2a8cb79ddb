//! The capability contract every payment backend implements.
//!
//! Optional capabilities (crypto, subscriptions, customer management) are
//! separate traits. A backend exposes them through the `as_*` accessors on
//! [`PaymentProcessor`]; the default is `None`, which callers turn into
//! [`PaymentError::UnsupportedCapability`](crate::processor::PaymentError).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::processor::error::Result;
use crate::processor::types::{
    BackendType, Balance, Cents, Currency, PaymentRequest, PaymentResult, RefundRequest,
    RefundResult, Subscription, SubscriptionRequest, SubscriptionUpdate, Transaction,
    WebhookEvent,
};

/// Uniform operation set of a payment backend.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn backend_type(&self) -> BackendType;

    /// Authorize and capture in one step.
    async fn charge(&self, req: PaymentRequest) -> Result<PaymentResult>;

    /// Authorize without capturing.
    async fn authorize(&self, req: PaymentRequest) -> Result<PaymentResult>;

    /// Capture a previously authorized payment.
    async fn capture(&self, transaction_id: &str, amount: Cents) -> Result<PaymentResult>;

    async fn refund(&self, req: RefundRequest) -> Result<RefundResult>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction>;

    /// Verify an incoming webhook with the backend's own signature scheme.
    async fn validate_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent>;

    fn supported_currencies(&self) -> Vec<Currency>;

    /// Whether the backend is configured and able to take traffic.
    async fn is_available(&self) -> bool;

    fn as_crypto(self: Arc<Self>) -> Option<Arc<dyn CryptoProcessor>> {
        None
    }

    fn as_subscription(self: Arc<Self>) -> Option<Arc<dyn SubscriptionProcessor>> {
        None
    }

    fn as_customer(self: Arc<Self>) -> Option<Arc<dyn CustomerProcessor>> {
        None
    }
}

/// Crypto custody / on-chain capability.
#[async_trait]
pub trait CryptoProcessor: PaymentProcessor {
    /// Create a new deposit address for a customer on the given chain.
    async fn generate_address(&self, customer_id: &str, chain: &str) -> Result<String>;

    async fn get_balance(&self, address: &str, chain: &str) -> Result<Balance>;

    async fn estimate_fee(&self, req: &PaymentRequest) -> Result<Cents>;

    fn supported_chains(&self) -> Vec<String>;
}

/// Recurring billing capability.
#[async_trait]
pub trait SubscriptionProcessor: PaymentProcessor {
    async fn create_subscription(&self, req: SubscriptionRequest) -> Result<Subscription>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription>;

    async fn cancel_subscription(&self, subscription_id: &str, immediately: bool) -> Result<()>;

    async fn update_subscription(
        &self,
        subscription_id: &str,
        update: SubscriptionUpdate,
    ) -> Result<Subscription>;

    async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<Subscription>>;
}

/// Stored-customer capability.
#[async_trait]
pub trait CustomerProcessor: PaymentProcessor {
    /// Returns the backend's customer id.
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: Map<String, Value>,
    ) -> Result<String>;

    async fn get_customer(&self, customer_id: &str) -> Result<Map<String, Value>>;

    async fn update_customer(&self, customer_id: &str, updates: Map<String, Value>) -> Result<()>;

    async fn delete_customer(&self, customer_id: &str) -> Result<()>;

    /// Returns the payment method id.
    async fn add_payment_method(&self, customer_id: &str, token: &str) -> Result<String>;

    async fn remove_payment_method(&self, customer_id: &str, payment_method_id: &str)
        -> Result<()>;
}

/// Whether `processor` lists `currency` among its supported currencies.
pub fn supports_currency(processor: &dyn PaymentProcessor, currency: &Currency) -> bool {
    processor
        .supported_currencies()
        .iter()
        .any(|c| c == currency)
}
