//! Currency-based ordering.

use std::collections::{HashMap, HashSet};

use crate::load_balancer::{extend_unique, CandidateSelector, SelectionContext};
use crate::processor::{BackendType, Currency};

/// The backend mapped from the request currency, then primary, then the rest.
#[derive(Debug, Default)]
pub struct CurrencyBased {
    routes: HashMap<Currency, BackendType>,
}

impl CurrencyBased {
    /// Keys are normalised the same way request currencies are.
    pub fn new(currency_map: &HashMap<String, BackendType>) -> Self {
        let routes = currency_map
            .iter()
            .map(|(code, backend)| (Currency::new(code), backend.clone()))
            .collect();
        Self { routes }
    }
}

impl CandidateSelector for CurrencyBased {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType> {
        let mut out = Vec::with_capacity(ctx.processors.len() + 2);
        let mut seen = HashSet::with_capacity(ctx.processors.len() + 2);
        extend_unique(&mut out, &mut seen, self.routes.get(&ctx.request.currency));
        extend_unique(&mut out, &mut seen, ctx.primary);
        extend_unique(&mut out, &mut seen, ctx.processors);
        out
    }
}
