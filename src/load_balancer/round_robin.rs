//! Round-robin ordering.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{CandidateSelector, SelectionContext};
use crate::processor::BackendType;

/// Rotates the configured list by one position per call.
/// Stores an internal counter so concurrent callers get distinct offsets.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next call will start from.
    pub fn next_offset(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

impl CandidateSelector for RoundRobin {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType> {
        let len = ctx.processors.len();
        if len == 0 {
            return Vec::new();
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed) % len;
        (0..len)
            .map(|i| ctx.processors[(start + i) % len].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{backends, names, slots};
    use crate::processor::PaymentRequest;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let processors = backends(&["stripe", "square", "adyen"]);
        let table = slots(&processors);
        let req = PaymentRequest::new(100, "usd");
        let ctx = SelectionContext {
            processors: &processors,
            primary: None,
            request: &req,
            slots: &table,
        };

        assert_eq!(names(&lb.candidates(&ctx)), vec!["stripe", "square", "adyen"]);
        assert_eq!(names(&lb.candidates(&ctx)), vec!["square", "adyen", "stripe"]);
        assert_eq!(names(&lb.candidates(&ctx)), vec!["adyen", "stripe", "square"]);
        assert_eq!(names(&lb.candidates(&ctx)), vec!["stripe", "square", "adyen"]);
        assert_eq!(lb.next_offset(), 4);
    }

    #[test]
    fn test_empty_processors() {
        let lb = RoundRobin::new();
        let processors = Vec::new();
        let table = slots(&processors);
        let req = PaymentRequest::new(100, "usd");
        let ctx = SelectionContext {
            processors: &processors,
            primary: None,
            request: &req,
            slots: &table,
        };
        assert!(lb.candidates(&ctx).is_empty());
    }
}
