//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first allow() after reset_timeout since the last failure
//! Half-Open → Closed: any probe succeeds
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Open → Half-Open is lazy; there is no timer task
//! - The allow() call that flips Open → Half-Open is itself the first probe
//! - A probe permit dropped without an outcome hands its slot back, so a
//!   cancelled probe never wedges the breaker in Half-Open

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::observability::metrics;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HALF_OPEN_MAX: u32 = 1;

/// Per-backend breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// How long the breaker stays open before probing.
    #[serde(rename = "reset_timeout_ms", with = "duration_ms")]
    pub reset_timeout: Duration,

    /// Probe requests allowed while half-open.
    pub half_open_max: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            half_open_max: DEFAULT_HALF_OPEN_MAX,
        }
    }
}

impl CircuitBreakerConfig {
    /// Replace zero values with the defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.failure_threshold == 0 {
            self.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if self.reset_timeout.is_zero() {
            self.reset_timeout = DEFAULT_RESET_TIMEOUT;
        }
        if self.half_open_max == 0 {
            self.half_open_max = DEFAULT_HALF_OPEN_MAX;
        }
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_requests: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    half_open_requests: u32,
    last_failure: Option<Instant>,
    /// Bumped on every Open → Half-Open transition.
    probe_epoch: u64,
}

/// Three-state failure-isolation machine for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: config.with_defaults(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                half_open_requests: 0,
                last_failure: None,
                probe_epoch: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may proceed. May move Open → Half-Open.
    ///
    /// A half-open slot taken here is only returned by an outcome; callers
    /// that can be cancelled should use [`permit`](Self::permit).
    pub fn allow(&self) -> bool {
        self.admit().is_some()
    }

    /// Like [`allow`](Self::allow), but the admission is held by a permit.
    /// Settle it with [`BreakerPermit::success`] or [`BreakerPermit::failure`];
    /// dropping it unsettled releases any half-open slot it holds.
    pub fn permit(&self) -> Option<BreakerPermit<'_>> {
        self.admit().map(|probe| BreakerPermit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    /// `Some(None)` for a closed-state admission, `Some(Some(epoch))` for a
    /// half-open probe slot.
    fn admit(&self) -> Option<Option<u64>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(None),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if !elapsed {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.half_open_requests = 1;
                inner.probe_epoch = inner.probe_epoch.wrapping_add(1);
                let epoch = inner.probe_epoch;
                drop(inner);
                tracing::info!(backend = %self.name, "Circuit half-open, probing");
                metrics::record_breaker_transition(&self.name, CircuitState::HalfOpen);
                Some(Some(epoch))
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.half_open_max {
                    inner.half_open_requests += 1;
                    Some(Some(inner.probe_epoch))
                } else {
                    None
                }
            }
        }
    }

    /// Return a probe slot taken in `epoch` without recording an outcome.
    fn release_probe(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.state != CircuitState::HalfOpen || inner.probe_epoch != epoch {
            return;
        }
        inner.half_open_requests = inner.half_open_requests.saturating_sub(1);
        drop(inner);
        tracing::debug!(backend = %self.name, "Probe abandoned, slot released");
    }

    /// Record a successful call. Always closes the breaker.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.failures = 0;
        inner.half_open_requests = 0;
        inner.state = CircuitState::Closed;
        drop(inner);

        if previous != CircuitState::Closed {
            tracing::info!(backend = %self.name, "Circuit closed");
            metrics::record_breaker_transition(&self.name, CircuitState::Closed);
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        let opened = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if opened {
            inner.state = CircuitState::Open;
        }
        let failures = inner.failures;
        drop(inner);

        if opened {
            tracing::warn!(
                backend = %self.name,
                consecutive_failures = failures,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                "Circuit opened"
            );
            metrics::record_breaker_transition(&self.name, CircuitState::Open);
        }
    }

    /// Current state without side effects. An open breaker whose timeout has
    /// elapsed still reports Open until the next allow().
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.failures,
            half_open_requests: inner.half_open_requests,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Admission to call a backend, returned by [`CircuitBreaker::permit`].
#[must_use = "an unsettled permit records no outcome"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: Option<u64>,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// Whether this permit holds a half-open probe slot.
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(epoch) = self.probe {
            self.breaker.release_probe(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64, half_open_max: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_millis(reset_ms),
                half_open_max,
            },
        )
    }

    #[test]
    fn test_defaults_fill_zero_values() {
        let cfg = CircuitBreakerConfig {
            failure_threshold: 0,
            reset_timeout: Duration::ZERO,
            half_open_max: 0,
        }
        .with_defaults();
        assert_eq!(cfg, CircuitBreakerConfig::default());
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.reset_timeout, Duration::from_secs(30));
        assert_eq!(cfg.half_open_max, 1);
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, 60_000, 1);
        for _ in 0..2 {
            assert!(cb.allow());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, 60_000, 1);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 2);
    }

    #[test]
    fn test_half_open_allows_bounded_probes() {
        let cb = breaker(1, 20, 2);
        cb.record_failure();
        assert!(!cb.allow());

        std::thread::sleep(Duration::from_millis(30));

        // The transition itself consumes the first probe slot.
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow());
        assert!(!cb.allow());
    }

    #[test]
    fn test_single_probe_by_default() {
        let cb = breaker(1, 20, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.allow());
        assert!(!cb.allow());
    }

    #[test]
    fn test_probe_success_closes() {
        let cb = breaker(2, 20, 1);
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.allow());
        cb.record_success();
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.half_open_requests, 0);
        assert!(cb.allow());
    }

    #[test]
    fn test_probe_failure_reopens_immediately() {
        let cb = breaker(5, 20, 1);
        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.allow());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn test_dropped_half_open_permit_frees_slot() {
        let cb = breaker(1, 20, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        let permit = cb.permit().unwrap();
        assert!(permit.is_probe());
        assert!(cb.permit().is_none());
        drop(permit);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().half_open_requests, 0);
        let permit = cb.permit().unwrap();
        permit.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_permit_leaves_new_probe_window_alone() {
        let cb = breaker(1, 20, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        let stale = cb.permit().unwrap();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        let current = cb.permit().unwrap();

        drop(stale);
        assert_eq!(cb.snapshot().half_open_requests, 1);
        assert!(cb.permit().is_none());
        current.failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_closed_permit_drop_is_neutral() {
        let cb = breaker(2, 60_000, 1);
        cb.record_failure();
        let permit = cb.permit().unwrap();
        assert!(!permit.is_probe());
        drop(permit);
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 1);
    }
}
