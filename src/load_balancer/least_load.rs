//! Least-load ordering.

use crate::load_balancer::{CandidateSelector, SelectionContext};
use crate::processor::BackendType;

/// Ascending in-flight count.
/// In case of tie, configuration order wins (stable sort).
#[derive(Debug, Default)]
pub struct LeastLoad;

impl LeastLoad {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateSelector for LeastLoad {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType> {
        let mut entries: Vec<(&BackendType, usize)> = ctx
            .processors
            .iter()
            .map(|b| (b, ctx.slots.in_flight(b)))
            .collect();
        entries.sort_by_key(|(_, load)| *load);
        entries.into_iter().map(|(b, _)| b.clone()).collect()
    }
}
