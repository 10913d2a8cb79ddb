//! Routed transaction identifiers.
//!
//! Wire format: `"<backendType>:<rawID>"`. The backend type is everything
//! before the first colon; the raw id is everything after it and must be
//! non-empty. A raw id may itself contain colons and round-trips unchanged,
//! but a backend type containing a colon cannot be represented.

use std::fmt;
use std::str::FromStr;

use crate::processor::{BackendType, PaymentError, Result};

pub const SEPARATOR: char = ':';

/// A backend-qualified transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutedId {
    pub backend: BackendType,
    pub raw: String,
}

impl RoutedId {
    pub fn new(backend: BackendType, raw: impl Into<String>) -> Self {
        Self {
            backend,
            raw: raw.into(),
        }
    }

    /// Split a routed id, rejecting a missing prefix or an empty raw id.
    pub fn parse(id: &str) -> Result<Self> {
        let Some((prefix, raw)) = id.split_once(SEPARATOR) else {
            return Err(invalid(id, "has no processor prefix"));
        };
        if prefix.is_empty() {
            return Err(invalid(id, "has no processor prefix"));
        }
        if raw.is_empty() {
            return Err(invalid(id, "has empty raw ID"));
        }
        Ok(Self::new(BackendType::from(prefix), raw))
    }
}

impl fmt::Display for RoutedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.backend, SEPARATOR, self.raw)
    }
}

impl FromStr for RoutedId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// `"<backend>:<raw>"`.
pub fn encode(backend: &BackendType, raw: &str) -> String {
    format!("{}{}{}", backend, SEPARATOR, raw)
}

fn invalid(id: &str, reason: &'static str) -> PaymentError {
    PaymentError::InvalidTransactionId {
        id: id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed() {
        let id = RoutedId::parse("stripe:ch_123").unwrap();
        assert_eq!(id.backend.as_str(), "stripe");
        assert_eq!(id.raw, "ch_123");
    }

    #[test]
    fn test_reencoding_reproduces_input() {
        for s in ["stripe:ch_123", "square:tx_square", "paypal:a:b:c", "mpc:0xabc"] {
            let parsed: RoutedId = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
            assert_eq!(encode(&parsed.backend, &parsed.raw), s);
        }
    }

    #[test]
    fn test_rejects_missing_prefix() {
        for s in ["ch_123", ":ch_123", ""] {
            let err = RoutedId::parse(s).unwrap_err();
            assert!(
                matches!(err, PaymentError::InvalidTransactionId { reason, .. } if reason.contains("prefix")),
                "{s}: {err}"
            );
        }
    }

    #[test]
    fn test_rejects_empty_raw_id() {
        let err = RoutedId::parse("stripe:").unwrap_err();
        assert!(matches!(
            err,
            PaymentError::InvalidTransactionId { reason: "has empty raw ID", .. }
        ));
    }
}
