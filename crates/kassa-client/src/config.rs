use std::time::Duration;

/// Resilience parameters for the customer-validation client. Defaults match
/// the service configuration shipped with the daemons.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Customer service base URL, e.g. `http://localhost:8081`.
    pub base_url: String,
    /// Attempts per call, counting the first (retries only transport and
    /// timeout errors).
    pub max_attempts: u32,
    /// Wait between attempts.
    pub retry_wait: Duration,
    /// Sliding window of call outcomes inspected by the breaker.
    pub window: usize,
    /// Minimum recorded calls before the failure rate is evaluated.
    pub min_calls: usize,
    /// Failure fraction that opens the breaker.
    pub failure_rate: f64,
    /// How long the breaker stays open before probing.
    pub open_wait: Duration,
    /// Probe calls admitted in the half-open state.
    pub half_open_probes: u32,
    /// Absolute deadline around the whole composition.
    pub deadline: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".into(),
            max_attempts: 2,
            retry_wait: Duration::from_millis(500),
            window: 20,
            min_calls: 5,
            failure_rate: 0.5,
            open_wait: Duration::from_secs(20),
            half_open_probes: 3,
            deadline: Duration::from_secs(5),
        }
    }
}
