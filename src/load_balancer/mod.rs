//! Candidate selection subsystem.
//!
//! # Data Flow
//! ```text
//! PaymentRouter.charge(request)
//!     → Strategy (one selector per router):
//!         - primary_fallback.rs (primary, then configured order)
//!         - round_robin.rs (configured order rotated by an atomic counter)
//!         - currency.rs (currency-mapped backend, primary, then the rest)
//!         - weighted.rs (weighted sampling without replacement)
//!         - least_load.rs (ascending in-flight count, stable)
//!     → ordered, de-duplicated candidate list
//!     → router attempts candidates one at a time
//! ```
//!
//! # Design Decisions
//! - Selectors only order backends; availability and breaker checks happen in
//!   the router while attempting
//! - Every strategy returns every configured backend so one call can fail over
//!   through the whole set
//! - pool.rs owns per-backend slots (breaker + in-flight counter)

pub mod backend;
pub mod currency;
pub mod least_load;
pub mod pool;
pub mod primary_fallback;
pub mod round_robin;
pub mod weighted;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::load_balancer::pool::SlotTable;
use crate::processor::{BackendType, PaymentRequest};

pub use currency::CurrencyBased;
pub use least_load::LeastLoad;
pub use primary_fallback::PrimaryFallback;
pub use round_robin::RoundRobin;
pub use weighted::WeightedRandom;

/// Routing algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    PrimaryFallback,
    RoundRobin,
    CurrencyBased,
    WeightedRandom,
    LeastLoad,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::PrimaryFallback => "primary_fallback",
            Strategy::RoundRobin => "round_robin",
            Strategy::CurrencyBased => "currency_based",
            Strategy::WeightedRandom => "weighted_random",
            Strategy::LeastLoad => "least_load",
        }
    }
}

/// Inputs available to a selector for one call.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub processors: &'a [BackendType],
    pub primary: Option<&'a BackendType>,
    pub request: &'a PaymentRequest,
    pub slots: &'a SlotTable,
}

/// Orders the backends one routed call will attempt.
pub trait CandidateSelector: Send + Sync + std::fmt::Debug {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType>;
}

/// Append `items` to `out`, skipping anything already present.
pub(crate) fn extend_unique<'a>(
    out: &mut Vec<BackendType>,
    seen: &mut HashSet<BackendType>,
    items: impl IntoIterator<Item = &'a BackendType>,
) {
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item.clone());
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::resilience::CircuitBreakerConfig;

    pub fn backends(names: &[&str]) -> Vec<BackendType> {
        names.iter().map(|n| BackendType::from(*n)).collect()
    }

    pub fn names(list: &[BackendType]) -> Vec<&str> {
        list.iter().map(|b| b.as_str()).collect()
    }

    pub fn slots(processors: &[BackendType]) -> SlotTable {
        SlotTable::new(processors, CircuitBreakerConfig::default())
    }
}
