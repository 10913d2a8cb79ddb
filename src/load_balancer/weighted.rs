//! Weighted random ordering.
//!
//! Builds a full ordering by repeatedly sampling from the remaining pool with
//! probability proportional to weight. That is O(n²) in the number of
//! backends, which stays trivial for the single-digit sets this routes over.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::load_balancer::{CandidateSelector, SelectionContext};
use crate::processor::BackendType;

#[derive(Debug)]
pub struct WeightedRandom {
    weights: HashMap<BackendType, i64>,
    rng: Mutex<StdRng>,
}

impl WeightedRandom {
    pub fn new(weights: HashMap<BackendType, i64>) -> Self {
        Self::with_rng(weights, StdRng::from_entropy())
    }

    /// Deterministic ordering sequence, for tests and replay.
    pub fn with_seed(weights: HashMap<BackendType, i64>, seed: u64) -> Self {
        Self::with_rng(weights, StdRng::seed_from_u64(seed))
    }

    fn with_rng(weights: HashMap<BackendType, i64>, rng: StdRng) -> Self {
        Self {
            weights,
            rng: Mutex::new(rng),
        }
    }

    /// Effective weight: non-positive and missing weights count as 1.
    pub fn weight_of(&self, backend: &BackendType) -> u64 {
        match self.weights.get(backend) {
            Some(&w) if w > 0 => w as u64,
            _ => 1,
        }
    }
}

impl CandidateSelector for WeightedRandom {
    fn candidates(&self, ctx: &SelectionContext<'_>) -> Vec<BackendType> {
        if ctx.processors.is_empty() {
            return Vec::new();
        }

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        if self.weights.is_empty() {
            let mut out = ctx.processors.to_vec();
            out.shuffle(&mut *rng);
            return out;
        }

        let mut remaining: Vec<(&BackendType, u64)> = ctx
            .processors
            .iter()
            .map(|b| (b, self.weight_of(b)))
            .collect();
        let mut out = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let total: u64 = remaining.iter().map(|(_, w)| w).sum();
            let pick = rng.gen_range(0..total);

            let mut cumulative = 0;
            let mut chosen = remaining.len() - 1;
            for (i, (_, w)) in remaining.iter().enumerate() {
                cumulative += w;
                if pick < cumulative {
                    chosen = i;
                    break;
                }
            }
            let (backend, _) = remaining.swap_remove(chosen);
            out.push(backend.clone());
        }
        out
    }
}
