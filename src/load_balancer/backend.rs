//! Per-backend routing slot.
//!
//! # Responsibilities
//! - Own the backend's circuit breaker
//! - Track in-flight calls (load signal for the least-load strategy)
//!
//! The in-flight count is advisory: nothing is ever rejected because of it.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::observability::metrics;
use crate::processor::BackendType;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Routing state for one configured backend.
#[derive(Debug)]
pub struct BackendSlot {
    backend: BackendType,
    breaker: CircuitBreaker,
    in_flight: AtomicUsize,
}

impl BackendSlot {
    pub fn new(backend: BackendType, breaker_config: CircuitBreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(backend.as_str(), breaker_config);
        Self {
            backend,
            breaker,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &BackendType {
        &self.backend
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Current number of calls executing against this backend.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Count one call as in flight until the returned guard drops.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_in_flight(self.backend.as_str(), now);
        InFlightGuard { slot: self.clone() }
    }

    /// Raise the in-flight count without a guard. Pair with [`release`](Self::release).
    pub fn acquire(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// RAII guard that decrements the in-flight count on drop, including when
/// the awaiting future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    slot: Arc<BackendSlot>,
}

impl Deref for InFlightGuard {
    type Target = BackendSlot;
    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slot.release();
        metrics::record_in_flight(self.slot.backend.as_str(), self.slot.in_flight());
    }
}
