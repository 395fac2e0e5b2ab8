//! Circuit breaker for the external source systems
//!
//! Modeled as an explicit three-state machine so the policy is testable on
//! its own:
//!
//! - `Closed`: requests flow; consecutive failures are counted.
//! - `Open`: requests are refused until the cooldown elapses.
//! - `HalfOpen`: one trial request is allowed; success closes the breaker,
//!   failure re-opens it.

use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: State,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: State::Closed { failures: 0 },
            failure_threshold,
            cooldown,
        }
    }

    /// Whether a request may be attempted right now.
    ///
    /// Transitions `Open` -> `HalfOpen` when the cooldown has elapsed, so the
    /// next caller gets the trial slot.
    pub fn can_attempt(&mut self) -> bool {
        match self.state {
            State::Closed { .. } => true,
            State::HalfOpen => true,
            State::Open { since } => {
                if since.elapsed() >= self.cooldown {
                    info!("circuit breaker half-open, allowing trial request");
                    self.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != (State::Closed { failures: 0 }) {
            if matches!(self.state, State::HalfOpen) {
                info!("circuit breaker closed after successful trial");
            }
            self.state = State::Closed { failures: 0 };
        }
    }

    pub fn record_failure(&mut self) {
        match self.state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    warn!(failures, "circuit breaker opened");
                    self.state = State::Open {
                        since: Instant::now(),
                    };
                } else {
                    self.state = State::Closed { failures };
                }
            }
            State::HalfOpen => {
                warn!("circuit breaker re-opened after failed trial");
                self.state = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }
}
