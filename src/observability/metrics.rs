//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (attempts, breaker transitions, load, latency)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `payrouter_attempts_total` (counter): routed attempts by backend, outcome
//! - `payrouter_breaker_transitions_total` (counter): by backend, new state
//! - `payrouter_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `payrouter_in_flight` (gauge): delegate calls in progress per backend
//! - `payrouter_route_duration_seconds` (histogram): routed call latency by op
//!
//! # Design Decisions
//! - Facade calls are no-ops until a recorder is installed (tests, CLI)
//! - Labels for backend, outcome, operation

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One routed attempt against `backend`.
///
/// Outcomes: `success`, `failure`, `circuit_open`, `unregistered`, `unavailable`.
pub fn record_attempt(backend: &str, outcome: &'static str) {
    counter!(
        "payrouter_attempts_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_breaker_transition(backend: &str, state: CircuitState) {
    counter!(
        "payrouter_breaker_transitions_total",
        "backend" => backend.to_string(),
        "state" => state.as_str()
    )
    .increment(1);

    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("payrouter_breaker_state", "backend" => backend.to_string()).set(value);
}

pub fn record_in_flight(backend: &str, count: usize) {
    gauge!("payrouter_in_flight", "backend" => backend.to_string()).set(count as f64);
}

/// Latency of a whole routed call, failover included.
pub fn record_route_latency(op: &'static str, start_time: Instant) {
    histogram!("payrouter_route_duration_seconds", "op" => op)
        .record(start_time.elapsed().as_secs_f64());
}
