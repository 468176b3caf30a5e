use serde::Deserialize;
use tracing::{debug, warn};

use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;

use crate::breaker::CircuitBreaker;
use crate::config::ClientConfig;

/// The peer's view of a customer, as returned by the Customer service API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: CustomerId,
    pub name: String,
    pub identification: String,
    pub active: bool,
}

#[derive(Clone, Copy)]
enum Endpoint {
    Validate,
    Get,
}

/// HTTP client for the Customer service with retry, circuit breaker and an
/// absolute deadline. Shared across request tasks behind an `Arc`.
pub struct CustomerClient {
    http: reqwest::Client,
    config: ClientConfig,
    breaker: CircuitBreaker,
}

impl CustomerClient {
    pub fn new(config: ClientConfig) -> Result<Self, KassaError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(2))
            .build()
            .map_err(|e| KassaError::Internal(format!("building HTTP client: {e}")))?;
        let breaker = CircuitBreaker::new(
            config.window,
            config.min_calls,
            config.failure_rate,
            config.open_wait,
            config.half_open_probes,
        );
        Ok(Self {
            http,
            config,
            breaker,
        })
    }

    /// 200 → active customer; 400 → `CUSTOMER_NOT_ACTIVE`; 404 →
    /// `CUSTOMER_NOT_FOUND`; everything else → `SERVICE_UNAVAILABLE`.
    pub async fn validate_customer(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<CustomerSummary, KassaError> {
        let url = format!(
            "{}/api/v1/customers/{customer_id}/validate",
            self.config.base_url
        );
        self.fetch(ctx, customer_id, &url, Endpoint::Validate).await
    }

    pub async fn get_customer(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<CustomerSummary, KassaError> {
        let url = format!("{}/api/v1/customers/{customer_id}", self.config.base_url);
        self.fetch(ctx, customer_id, &url, Endpoint::Get).await
    }

    pub async fn exists(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<bool, KassaError> {
        match self.get_customer(ctx, customer_id).await {
            Ok(_) => Ok(true),
            Err(KassaError::CustomerNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Current breaker state, exposed for logging and tests.
    pub fn breaker_status(&self) -> crate::breaker::BreakerStatus {
        self.breaker.status()
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        url: &str,
        endpoint: Endpoint,
    ) -> Result<CustomerSummary, KassaError> {
        match tokio::time::timeout(self.config.deadline, self.guarded(ctx, customer_id, url, endpoint))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                self.breaker.record_failure();
                warn!(%customer_id, "customer call exceeded deadline");
                Err(KassaError::ServiceUnavailable(
                    "customer service call timed out".into(),
                ))
            }
        }
    }

    async fn guarded(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        url: &str,
        endpoint: Endpoint,
    ) -> Result<CustomerSummary, KassaError> {
        self.breaker.try_acquire()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(ctx, url).await {
                Ok(response) => return self.classify(customer_id, endpoint, response).await,
                Err(e) if attempt < self.config.max_attempts => {
                    debug!(%customer_id, attempt, error = %e, "customer call failed — retrying");
                    tokio::time::sleep(self.config.retry_wait).await;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    warn!(%customer_id, attempt, error = %e, "customer call failed");
                    return Err(KassaError::ServiceUnavailable(format!(
                        "customer service unreachable: {e}"
                    )));
                }
            }
        }
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        url: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .get(url)
            .header("x-request-id", ctx.request_id.to_string())
            .header("x-correlation-id", ctx.correlation_id.to_string());
        match &ctx.bearer {
            Some(token) => request = request.bearer_auth(token),
            None => warn!("no bearer token on inbound request — calling peer unauthenticated"),
        }
        request.send().await
    }

    async fn classify(
        &self,
        customer_id: CustomerId,
        endpoint: Endpoint,
        response: reqwest::Response,
    ) -> Result<CustomerSummary, KassaError> {
        let status = response.status();
        if status.is_success() {
            return match response.json::<CustomerSummary>().await {
                Ok(customer) => {
                    self.breaker.record_success();
                    Ok(customer)
                }
                Err(e) => {
                    self.breaker.record_failure();
                    warn!(%customer_id, error = %e, "malformed customer response");
                    Err(KassaError::ServiceUnavailable(
                        "malformed customer service response".into(),
                    ))
                }
            };
        }

        // Business outcomes: the peer is healthy, the entity is not.
        match (endpoint, status.as_u16()) {
            (_, 404) => {
                self.breaker.record_success();
                Err(KassaError::CustomerNotFound(customer_id))
            }
            (Endpoint::Validate, 400) => {
                self.breaker.record_success();
                Err(KassaError::CustomerNotActive(customer_id))
            }
            _ => {
                self.breaker.record_failure();
                warn!(%customer_id, %status, "unexpected customer service status");
                Err(KassaError::ServiceUnavailable(format!(
                    "customer service returned {status}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerStatus;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    struct StubState {
        status: Arc<AtomicU16>,
        hits: Arc<AtomicUsize>,
        delay: Duration,
    }

    async fn stub_validate(State(s): State<StubState>) -> impl IntoResponse {
        s.hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(s.delay).await;
        match s.status.load(Ordering::SeqCst) {
            200 => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "customerId": "550e8400-e29b-41d4-a716-446655440000",
                    "name": "Jose Lema",
                    "identification": "1710034065",
                    "active": true,
                })),
            )
                .into_response(),
            code => StatusCode::from_u16(code).unwrap().into_response(),
        }
    }

    async fn start_stub(status: u16, delay: Duration) -> (String, StubState) {
        let state = StubState {
            status: Arc::new(AtomicU16::new(status)),
            hits: Arc::new(AtomicUsize::new(0)),
            delay,
        };
        let app = Router::new()
            .route("/api/v1/customers/:id/validate", get(stub_validate))
            .route("/api/v1/customers/:id", get(stub_validate))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), state)
    }

    fn config(base_url: String) -> ClientConfig {
        ClientConfig {
            base_url,
            max_attempts: 2,
            retry_wait: Duration::from_millis(10),
            window: 4,
            min_calls: 2,
            failure_rate: 0.5,
            open_wait: Duration::from_millis(200),
            half_open_probes: 1,
            deadline: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn validate_parses_active_customer() {
        let (base, _) = start_stub(200, Duration::ZERO).await;
        let client = CustomerClient::new(config(base)).unwrap();
        let customer = client
            .validate_customer(&RequestContext::new(), CustomerId::new())
            .await
            .unwrap();
        assert!(customer.active);
        assert_eq!(customer.identification, "1710034065");
    }

    #[tokio::test]
    async fn validate_maps_business_statuses() {
        let (base, state) = start_stub(404, Duration::ZERO).await;
        let client = CustomerClient::new(config(base)).unwrap();
        let ctx = RequestContext::new();

        let err = client
            .validate_customer(&ctx, CustomerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KassaError::CustomerNotFound(_)));

        state.status.store(400, Ordering::SeqCst);
        let err = client
            .validate_customer(&ctx, CustomerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KassaError::CustomerNotActive(_)));

        // Business outcomes never trip the breaker.
        assert_eq!(client.breaker_status(), BreakerStatus::Closed);
    }

    #[tokio::test]
    async fn breaker_opens_on_server_errors_and_fails_fast() {
        let (base, state) = start_stub(500, Duration::ZERO).await;
        let client = CustomerClient::new(config(base)).unwrap();
        let ctx = RequestContext::new();

        for _ in 0..2 {
            let err = client
                .validate_customer(&ctx, CustomerId::new())
                .await
                .unwrap_err();
            assert!(matches!(err, KassaError::ServiceUnavailable(_)));
        }
        assert_eq!(client.breaker_status(), BreakerStatus::Open);

        let hits_before = state.hits.load(Ordering::SeqCst);
        let started = Instant::now();
        let err = client
            .validate_customer(&ctx, CustomerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KassaError::ServiceUnavailable(_)));
        assert!(started.elapsed() < Duration::from_millis(10));
        assert_eq!(state.hits.load(Ordering::SeqCst), hits_before);
    }

    #[tokio::test]
    async fn breaker_recovers_through_half_open_probe() {
        let (base, state) = start_stub(500, Duration::ZERO).await;
        let client = CustomerClient::new(config(base)).unwrap();
        let ctx = RequestContext::new();

        for _ in 0..2 {
            let _ = client.validate_customer(&ctx, CustomerId::new()).await;
        }
        assert_eq!(client.breaker_status(), BreakerStatus::Open);

        tokio::time::sleep(Duration::from_millis(250)).await;
        state.status.store(200, Ordering::SeqCst);
        client
            .validate_customer(&ctx, CustomerId::new())
            .await
            .unwrap();
        assert_eq!(client.breaker_status(), BreakerStatus::Closed);
    }

    #[tokio::test]
    async fn exists_maps_not_found_to_false() {
        let (base, state) = start_stub(200, Duration::ZERO).await;
        let client = CustomerClient::new(config(base)).unwrap();
        let ctx = RequestContext::new();

        assert!(client.exists(&ctx, CustomerId::new()).await.unwrap());

        state.status.store(404, Ordering::SeqCst);
        assert!(!client.exists(&ctx, CustomerId::new()).await.unwrap());

        state.status.store(500, Ordering::SeqCst);
        assert!(client.exists(&ctx, CustomerId::new()).await.is_err());
    }

    #[tokio::test]
    async fn deadline_expiry_is_service_unavailable() {
        let (base, _) = start_stub(200, Duration::from_secs(5)).await;
        let client = CustomerClient::new(config(base)).unwrap();

        let started = Instant::now();
        let err = client
            .validate_customer(&RequestContext::new(), CustomerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KassaError::ServiceUnavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn transport_errors_are_retried_then_converted() {
        // Nothing listens on this port.
        let client = CustomerClient::new(config("http://127.0.0.1:1".into())).unwrap();
        let err = client
            .validate_customer(&RequestContext::new(), CustomerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KassaError::ServiceUnavailable(_)));
    }
}
