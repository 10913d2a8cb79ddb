//! Primary-then-fallback ordering.

use std::collections::HashSet;

use crate::load_balancer::{extend_unique, CandidateSelector, SelectionContext};
use crate::processor::BackendType;

/// Primary first (if set), then the configured processors in order.
#[derive(Debug, Default)]
pub struct PrimaryFallback;

impl PrimaryFallback {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateSelector for PrimaryFallback {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType> {
        let mut out = Vec::with_capacity(ctx.processors.len() + 1);
        let mut seen = HashSet::with_capacity(ctx.processors.len() + 1);
        extend_unique(&mut out, &mut seen, ctx.primary);
        extend_unique(&mut out, &mut seen, ctx.processors);
        out
    }
}
