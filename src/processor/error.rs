//! Error taxonomy for processors, the registry and the router.

use thiserror::Error;

use crate::processor::types::{BackendType, Currency};

/// Errors surfaced by payment operations.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// Backend is registered but missing credentials/settings.
    #[error("processor {0} is not configured")]
    NotConfigured(BackendType),

    /// Backend type has no registered instance.
    #[error("processor {0} not registered")]
    NotFound(BackendType),

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("processor {0} is not available")]
    Unavailable(BackendType),

    /// Backend is administratively disabled in the registry config.
    #[error("processor {0} is disabled")]
    Disabled(BackendType),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("currency {0} is not supported")]
    UnsupportedCurrency(Currency),

    #[error("processor {backend} does not support {capability}")]
    UnsupportedCapability {
        backend: BackendType,
        capability: &'static str,
    },

    /// Malformed routed transaction id.
    #[error("transaction ID {id:?} {reason}")]
    InvalidTransactionId { id: String, reason: &'static str },

    /// Every attempted backend failed; wraps the last failure.
    #[error("all processors failed after {attempts} attempt(s): {source}")]
    AllProcessorsFailed {
        attempts: usize,
        #[source]
        source: Box<PaymentError>,
    },

    /// No backend could even be attempted.
    #[error("no processor available: {0}")]
    NoProcessorAvailable(String),

    #[error("webhook validation failed")]
    WebhookValidationFailed,

    /// A backend's own failure (transport error or declined result).
    #[error("processor {backend} [{code}]: {message}")]
    Backend {
        backend: BackendType,
        code: String,
        message: String,
    },
}

impl PaymentError {
    pub fn backend(
        backend: impl Into<BackendType>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code for logs and API payloads.
    pub fn code(&self) -> &str {
        match self {
            Self::NotConfigured(_) => "NOT_CONFIGURED",
            Self::NotFound(_) => "PROCESSOR_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::Unavailable(_) => "PROCESSOR_UNAVAILABLE",
            Self::Disabled(_) => "PROCESSOR_DISABLED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            Self::UnsupportedCapability { .. } => "UNSUPPORTED_CAPABILITY",
            Self::InvalidTransactionId { .. } => "INVALID_TRANSACTION_ID",
            Self::AllProcessorsFailed { .. } => "ALL_FAILED",
            Self::NoProcessorAvailable(_) => "NO_PROCESSOR",
            Self::WebhookValidationFailed => "WEBHOOK_INVALID",
            Self::Backend { code, .. } => code,
        }
    }

    /// True for failures that say something about backend health rather
    /// than about the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::Unavailable(_) | Self::NotConfigured(_)
        )
    }
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
