//! Backend slot table.
//!
//! # Responsibilities
//! - Create exactly one slot (breaker + in-flight counter) per configured backend
//! - Provide lookups in configuration order
//!
//! The table is built once with the router and has no insert/remove API, so
//! its shape needs no lock. Each slot synchronises its own counters, which
//! keeps unrelated backends from contending with each other.

use std::collections::HashMap;
use std::sync::Arc;

use crate::load_balancer::backend::BackendSlot;
use crate::processor::BackendType;
use crate::resilience::CircuitBreakerConfig;

#[derive(Debug)]
pub struct SlotTable {
    slots: HashMap<BackendType, Arc<BackendSlot>>,
    order: Vec<BackendType>,
}

impl SlotTable {
    /// Build slots for `processors`. Duplicate entries share one slot.
    pub fn new(processors: &[BackendType], breaker_config: CircuitBreakerConfig) -> Self {
        let mut slots = HashMap::with_capacity(processors.len());
        let mut order = Vec::with_capacity(processors.len());
        for backend in processors {
            slots.entry(backend.clone()).or_insert_with(|| {
                order.push(backend.clone());
                Arc::new(BackendSlot::new(backend.clone(), breaker_config))
            });
        }
        Self { slots, order }
    }

    pub fn get(&self, backend: &BackendType) -> Option<&Arc<BackendSlot>> {
        self.slots.get(backend)
    }

    /// In-flight count for `backend`; zero for unknown backends.
    pub fn in_flight(&self, backend: &BackendType) -> usize {
        self.get(backend).map(|s| s.in_flight()).unwrap_or(0)
    }

    /// Slots in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendSlot>> {
        self.order.iter().filter_map(|b| self.slots.get(b))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
