//! Payment data model shared by every backend and the router.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::processor::error::{PaymentError, Result};

/// Identifier for a payment backend (e.g. "stripe", "adyen").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendType(pub String);

impl BackendType {
    pub const STRIPE: &'static str = "stripe";
    pub const SQUARE: &'static str = "square";
    pub const PAYPAL: &'static str = "paypal";
    pub const ADYEN: &'static str = "adyen";
    pub const BRAINTREE: &'static str = "braintree";
    pub const RECURLY: &'static str = "recurly";
    pub const LEMONSQUEEZY: &'static str = "lemonsqueezy";
    pub const BITCOIN: &'static str = "bitcoin";
    pub const ETHEREUM: &'static str = "ethereum";
    pub const MPC: &'static str = "mpc";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for BackendType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Amount in minor currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Cents {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl From<i32> for Cents {
    fn from(v: i32) -> Self {
        Self(v as i64)
    }
}

const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

const CRYPTO: &[&str] = &[
    "btc", "eth", "xbt", "sol", "usdc", "usdt", "matic", "avax", "lux",
];

/// Lowercase currency code ("usd", "jpy", "btc").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_lowercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Currencies whose minor unit equals the major unit.
    pub fn is_zero_decimal(&self) -> bool {
        ZERO_DECIMAL.contains(&self.0.as_str())
    }

    pub fn is_crypto(&self) -> bool {
        CRYPTO.contains(&self.0.as_str())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// Amount paired with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Cents,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: impl Into<Cents>, currency: impl Into<Currency>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
        }
    }
}

/// Option key carrying an explicit backend preference.
pub const PROCESSOR_OPTION: &str = "processor";

/// A payment to be charged or authorized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Cents,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Per-call options: backend preference, redirect URLs, etc.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    /// Opaque card/payment token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

impl Default for Currency {
    fn default() -> Self {
        Self(String::new())
    }
}

impl PaymentRequest {
    pub fn new(amount: impl Into<Cents>, currency: impl Into<Currency>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    /// Set the explicit backend preference.
    pub fn with_processor(mut self, backend: impl Into<BackendType>) -> Self {
        self.options.insert(
            PROCESSOR_OPTION.to_string(),
            Value::String(backend.into().0),
        );
        self
    }

    pub fn preferred_backend(&self) -> Option<BackendType> {
        self.options
            .get(PROCESSOR_OPTION)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(BackendType::from)
    }

    pub fn money(&self) -> Money {
        Money {
            amount: self.amount,
            currency: self.currency.clone(),
        }
    }

    /// Reject non-positive amounts and empty currencies.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(PaymentError::InvalidRequest(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.currency.is_empty() {
            return Err(PaymentError::InvalidRequest("currency is required".into()));
        }
        Ok(())
    }
}

/// Outcome of a charge, authorization or capture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: String,
    #[serde(default)]
    pub processor_ref: String,
    #[serde(default)]
    pub fee: Cents,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl PaymentResult {
    pub fn succeeded(transaction_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: transaction_id.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "failed".into(),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub transaction_id: String,
    pub amount: Cents,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl RefundRequest {
    pub fn new(transaction_id: impl Into<String>, amount: impl Into<Cents>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            amount: amount.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub success: bool,
    pub refund_id: String,
    #[serde(default)]
    pub processor_ref: String,
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A transaction as reported by a backend lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub processor_ref: String,
    /// charge, authorization, refund, transfer
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Cents,
    pub currency: Currency,
    pub status: String,
    #[serde(default)]
    pub fee: Cents,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub processor: BackendType,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub timestamp: i64,
}

/// Wallet balance reported by a crypto backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub available: Cents,
    pub pending: Cents,
    pub currency: Currency,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub trial_days: u32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    pub plan_id: String,
    /// active, canceled, past_due, trialing
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub plan_id: Option<String>,
    pub quantity: Option<u32>,
    pub cancel_at_period_end: Option<bool>,
}
