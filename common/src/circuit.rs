// Three-state circuit breaker shared by the RPC pool, the fee-payer pool
// and the cold store.
//
// Closed counts qualifying failures; at the threshold the circuit opens for
// `reset_timeout`. Once elapsed it admits up to `half_open_trials` probe
// calls: one success closes it again, one failure re-opens it with the
// timeout doubled (capped at `max_reset_timeout`).
//
// The breaker itself is not thread-safe; owners wrap it in their own lock.

use std::time::Duration;

use serde::Serialize;

use crate::time::{get_current_time_in_millis, TimestampMillis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_trials: u32,
    pub max_reset_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_trials: 2,
            max_reset_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<TimestampMillis>,
    current_timeout: Duration,
    trials_used: u32,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        let current_timeout = config.reset_timeout;
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            current_timeout,
            trials_used: 0,
        }
    }

    pub fn state(&mut self) -> CircuitState {
        self.maybe_transition_half_open(get_current_time_in_millis());
        self.state
    }

    // Whether a call may go through right now; half-open admits a bounded
    // number of trial calls
    pub fn allow_request(&mut self) -> bool {
        self.allow_request_at(get_current_time_in_millis())
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state != CircuitState::Closed {
            self.state = CircuitState::Closed;
            self.opened_at = None;
            self.trials_used = 0;
            self.current_timeout = self.config.reset_timeout;
        }
    }

    // Callers only report failures of a qualifying kind
    pub fn record_failure(&mut self) {
        self.record_failure_at(get_current_time_in_millis());
    }

    pub fn is_open(&mut self) -> bool {
        self.state() == CircuitState::Open
    }

    // Remaining wait before the next half-open probe window, None if the
    // circuit is not open
    pub fn time_until_half_open(&self) -> Option<Duration> {
        let opened_at = self.opened_at?;
        if self.state != CircuitState::Open {
            return None;
        }
        let elapsed = get_current_time_in_millis().saturating_sub(opened_at);
        let timeout = self.current_timeout.as_millis() as u64;
        Some(Duration::from_millis(timeout.saturating_sub(elapsed)))
    }

    fn maybe_transition_half_open(&mut self, now: TimestampMillis) {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if now.saturating_sub(opened_at) >= self.current_timeout.as_millis() as u64 {
                    self.state = CircuitState::HalfOpen;
                    self.trials_used = 0;
                }
            }
        }
    }

    fn allow_request_at(&mut self, now: TimestampMillis) -> bool {
        self.maybe_transition_half_open(now);
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.trials_used < self.config.half_open_trials {
                    self.trials_used += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_failure_at(&mut self, now: TimestampMillis) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                // A failed probe re-opens with a doubled, capped timeout
                self.current_timeout =
                    (self.current_timeout * 2).min(self.config.max_reset_timeout);
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(100),
            half_open_trials: 2,
            max_reset_timeout: Duration::from_millis(300),
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new(config());
        let now = 1_000;
        breaker.record_failure_at(now);
        breaker.record_failure_at(now);
        assert!(breaker.allow_request_at(now));
        breaker.record_failure_at(now);
        assert!(!breaker.allow_request_at(now));
    }

    #[test]
    fn test_half_open_admits_bounded_trials() {
        let mut breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.record_failure_at(1_000);
        }
        // Before the timeout nothing passes
        assert!(!breaker.allow_request_at(1_050));
        // After it, exactly two probes pass
        assert!(breaker.allow_request_at(1_101));
        assert!(breaker.allow_request_at(1_101));
        assert!(!breaker.allow_request_at(1_101));
    }

    #[test]
    fn test_probe_success_closes() {
        let mut breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.record_failure_at(1_000);
        }
        assert!(breaker.allow_request_at(1_101));
        breaker.record_success();
        assert!(breaker.allow_request_at(1_102));
        assert_eq!(breaker.state, CircuitState::Closed);
    }

    #[test]
    fn test_probe_failure_doubles_timeout_with_cap() {
        let mut breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.record_failure_at(1_000);
        }
        // First probe fails: timeout 100 -> 200
        assert!(breaker.allow_request_at(1_101));
        breaker.record_failure_at(1_101);
        assert!(!breaker.allow_request_at(1_250));
        assert!(breaker.allow_request_at(1_302));
        // Second probe fails: 200 -> 300 (capped), not 400
        breaker.record_failure_at(1_302);
        assert_eq!(breaker.current_timeout, Duration::from_millis(300));
        breaker.record_failure_at(1_700);
        assert_eq!(breaker.current_timeout, Duration::from_millis(300));
    }

    #[test]
    fn test_non_consecutive_failures_do_not_open() {
        let mut breaker = CircuitBreaker::new(config());
        breaker.record_failure_at(1_000);
        breaker.record_failure_at(1_000);
        breaker.record_success();
        breaker.record_failure_at(1_000);
        breaker.record_failure_at(1_000);
        assert!(breaker.allow_request_at(1_000));
    }
}
