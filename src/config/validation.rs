//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (primary, currency map and weights name
//!   configured processors)
//! - Detect duplicate processors and sandbox definitions
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::processor::BackendType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("router.processors must not be empty")]
    NoProcessors,

    #[error("processor {0} listed more than once in router.processors")]
    DuplicateProcessor(BackendType),

    #[error("router.primary {0} is not in router.processors")]
    UnknownPrimary(BackendType),

    #[error("router.currency_map[{currency}] = {backend} is not in router.processors")]
    UnknownCurrencyTarget {
        currency: String,
        backend: BackendType,
    },

    #[error("router.weights names {0}, which is not in router.processors")]
    UnknownWeight(BackendType),

    #[error("sandbox backend {0} defined more than once")]
    DuplicateSandbox(BackendType),

    #[error("sandbox backend type must not be empty")]
    EmptySandboxBackend,
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let router = &config.router;

    if router.processors.is_empty() {
        errors.push(ValidationError::NoProcessors);
    }

    let mut seen = HashSet::new();
    for backend in &router.processors {
        if !seen.insert(backend) {
            errors.push(ValidationError::DuplicateProcessor(backend.clone()));
        }
    }

    if let Some(primary) = &router.primary {
        if !seen.contains(primary) {
            errors.push(ValidationError::UnknownPrimary(primary.clone()));
        }
    }

    let mut currencies: Vec<_> = router.currency_map.iter().collect();
    currencies.sort();
    for (currency, backend) in currencies {
        if !seen.contains(backend) {
            errors.push(ValidationError::UnknownCurrencyTarget {
                currency: currency.clone(),
                backend: backend.clone(),
            });
        }
    }

    let mut weighted: Vec<_> = router.weights.keys().collect();
    weighted.sort();
    for backend in weighted {
        if !seen.contains(backend) {
            errors.push(ValidationError::UnknownWeight(backend.clone()));
        }
    }

    let mut sandboxes = HashSet::new();
    for sandbox in &config.sandbox {
        if sandbox.backend.is_empty() {
            errors.push(ValidationError::EmptySandboxBackend);
        } else if !sandboxes.insert(&sandbox.backend) {
            errors.push(ValidationError::DuplicateSandbox(sandbox.backend.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SandboxConfig;
    use crate::processor::Currency;

    fn backends(names: &[&str]) -> Vec<BackendType> {
        names.iter().map(|n| BackendType::from(*n)).collect()
    }

    fn sandbox(name: &str) -> SandboxConfig {
        SandboxConfig {
            backend: BackendType::from(name),
            currencies: vec![Currency::new("usd")],
            available: true,
            fail_charges: false,
            decline_charges: false,
            webhook_secret: None,
            extensions: true,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = GatewayConfig::default();
        config.router.processors = backends(&["stripe", "square"]);
        config.router.primary = Some(BackendType::from("stripe"));
        config.sandbox = vec![sandbox("stripe"), sandbox("square")];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_processors() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoProcessors]);
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.router.processors = backends(&["stripe", "stripe"]);
        config.router.primary = Some(BackendType::from("adyen"));
        config
            .router
            .currency_map
            .insert("jpy".into(), BackendType::from("square"));
        config.router.weights.insert(BackendType::from("paypal"), 2);
        config.sandbox = vec![sandbox("stripe"), sandbox("stripe"), sandbox("")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateProcessor(BackendType::from("stripe")),
                ValidationError::UnknownPrimary(BackendType::from("adyen")),
                ValidationError::UnknownCurrencyTarget {
                    currency: "jpy".into(),
                    backend: BackendType::from("square"),
                },
                ValidationError::UnknownWeight(BackendType::from("paypal")),
                ValidationError::DuplicateSandbox(BackendType::from("stripe")),
                ValidationError::EmptySandboxBackend,
            ]
        );
    }
}
