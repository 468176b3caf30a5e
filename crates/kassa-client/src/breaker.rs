use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use kassa_core::error::KassaError;

/// Observable breaker state, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

enum State {
    Closed,
    Open { until: Instant },
    HalfOpen { permits_left: u32, successes: u32 },
}

struct BreakerData {
    state: State,
    /// Outcomes of the last `window` recorded calls; `true` = success.
    outcomes: VecDeque<bool>,
}

/// Count-based sliding-window circuit breaker.
///
/// Closed: outcomes are recorded; once at least `min_calls` are in the
/// window and the failure fraction exceeds `failure_rate`, the breaker opens
/// for `open_wait`. Open: every acquisition fails immediately. After the
/// wait, up to `half_open_probes` probe calls are admitted; any probe
/// failure reopens, `half_open_probes` successes close.
pub struct CircuitBreaker {
    window: usize,
    min_calls: usize,
    failure_rate: f64,
    open_wait: Duration,
    half_open_probes: u32,
    data: Mutex<BreakerData>,
}

impl CircuitBreaker {
    pub fn new(
        window: usize,
        min_calls: usize,
        failure_rate: f64,
        open_wait: Duration,
        half_open_probes: u32,
    ) -> Self {
        Self {
            window,
            min_calls,
            failure_rate,
            open_wait,
            half_open_probes,
            data: Mutex::new(BreakerData {
                state: State::Closed,
                outcomes: VecDeque::new(),
            }),
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let data = self.data.lock().expect("breaker lock poisoned");
        match data.state {
            State::Closed => BreakerStatus::Closed,
            State::Open { .. } => BreakerStatus::Open,
            State::HalfOpen { .. } => BreakerStatus::HalfOpen,
        }
    }

    /// Admission check. While open this fails without touching the network.
    pub fn try_acquire(&self) -> Result<(), KassaError> {
        let mut data = self.data.lock().expect("breaker lock poisoned");
        match data.state {
            State::Closed => Ok(()),
            State::Open { until } => {
                if Instant::now() < until {
                    Err(KassaError::ServiceUnavailable(
                        "customer service circuit breaker is open".into(),
                    ))
                } else {
                    info!("circuit breaker half-open — admitting probes");
                    data.state = State::HalfOpen {
                        permits_left: self.half_open_probes.saturating_sub(1),
                        successes: 0,
                    };
                    Ok(())
                }
            }
            State::HalfOpen {
                ref mut permits_left,
                ..
            } => {
                if *permits_left > 0 {
                    *permits_left -= 1;
                    Ok(())
                } else {
                    Err(KassaError::ServiceUnavailable(
                        "customer service circuit breaker is open".into(),
                    ))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut data = self.data.lock().expect("breaker lock poisoned");
        match data.state {
            State::Closed => {
                Self::push(&mut data.outcomes, self.window, true);
            }
            State::HalfOpen {
                ref mut successes, ..
            } => {
                *successes += 1;
                if *successes >= self.half_open_probes {
                    info!("circuit breaker closed after successful probes");
                    data.state = State::Closed;
                    data.outcomes.clear();
                }
            }
            // A straggler finishing after the breaker reopened.
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut data = self.data.lock().expect("breaker lock poisoned");
        match data.state {
            State::Closed => {
                Self::push(&mut data.outcomes, self.window, false);
                let total = data.outcomes.len();
                if total >= self.min_calls {
                    let failures = data.outcomes.iter().filter(|ok| !**ok).count();
                    let rate = failures as f64 / total as f64;
                    if rate > self.failure_rate {
                        warn!(
                            failures,
                            total,
                            "failure rate exceeded — opening circuit breaker"
                        );
                        data.state = State::Open {
                            until: Instant::now() + self.open_wait,
                        };
                        data.outcomes.clear();
                    }
                }
            }
            State::HalfOpen { .. } => {
                warn!("probe failed — reopening circuit breaker");
                data.state = State::Open {
                    until: Instant::now() + self.open_wait,
                };
            }
            State::Open { .. } => {}
        }
    }

    fn push(outcomes: &mut VecDeque<bool>, window: usize, outcome: bool) {
        if outcomes.len() == window {
            outcomes.pop_front();
        }
        outcomes.push_back(outcome);
    }
}
