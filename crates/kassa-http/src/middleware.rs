use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use uuid::Uuid;

use kassa_auth::{Claims, TokenAuthority, ROLE_USER};
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;

use crate::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Authenticated subject attached to the request after verification.
#[derive(Debug, Clone)]
pub struct AuthSubject {
    pub claims: Claims,
    pub authorities: Vec<&'static str>,
}

#[derive(Clone)]
pub struct AuthState {
    pub authority: Arc<TokenAuthority>,
    /// Disabled in local development; every request then passes.
    pub enabled: bool,
}

/// Extract or generate tracing ids, capture the bearer token, and stash a
/// [`RequestContext`] extension. Mutating requests must carry both tracing
/// headers as UUIDs; a missing one is a 400 naming the header.
pub async fn trace_context(mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method();
    let mutating = method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE;

    let request_id = match header_uuid(&req, REQUEST_ID_HEADER) {
        Ok(id) => id,
        Err(missing) if mutating => {
            return missing_header_response(&path, missing);
        }
        Err(_) => None,
    };
    let correlation_id = match header_uuid(&req, CORRELATION_ID_HEADER) {
        Ok(id) => id,
        Err(missing) if mutating => {
            return missing_header_response(&path, missing);
        }
        Err(_) => None,
    };

    let bearer = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let ctx = RequestContext {
        request_id: request_id.unwrap_or_else(Uuid::new_v4),
        correlation_id: correlation_id.unwrap_or_else(Uuid::new_v4),
        bearer,
    };
    req.extensions_mut().insert(ctx.clone());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id.to_string()) {
        headers.insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Ok(Some) for a well-formed header, Ok(None) when absent on a read, and
/// Err(name) when absent or malformed where it is required.
fn header_uuid(req: &Request, name: &'static str) -> Result<Option<Uuid>, &'static str> {
    match req.headers().get(name) {
        None => Err(name),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(Some)
            .ok_or(name),
    }
}

fn missing_header_response(path: &str, header: &str) -> Response {
    ApiError::new(
        KassaError::Validation(format!("required header {header} is missing or not a UUID")),
        path.to_string(),
        Uuid::new_v4(),
    )
    .into_response()
}

/// Verify the bearer token on every non-public path; bind the subject and
/// its single `ROLE_USER` authority to the request on success, 401 with the
/// canonical body otherwise.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled || is_public(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    let trace_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.correlation_id)
        .unwrap_or_else(Uuid::new_v4);

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        warn!(%path, "request without bearer token rejected");
        return ApiError::new(
            KassaError::Unauthorized("missing bearer token".into()),
            path,
            trace_id,
        )
        .into_response();
    };

    match auth.authority.verify(token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthSubject {
                claims,
                authorities: vec![ROLE_USER],
            });
            next.run(req).await
        }
        Err(err) => ApiError::new(err, path, trace_id).into_response(),
    }
}

/// Paths served without authentication: customer sign-up, health and docs.
fn is_public(method: &Method, path: &str) -> bool {
    (*method == Method::POST && path == "/api/v1/customers")
        || path == "/health"
        || path.starts_with("/docs")
}

/// CORS from the configured allowed origins; `*` means any.
pub fn cors_layer(origins: &[String]) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(parsed)
        .allow_headers(Any)
}

/// Server-side soft deadline: cancel in-flight work and answer 504 when a
/// request exceeds `limit`.
pub async fn soft_deadline(limit: Duration, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let trace_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.correlation_id)
        .unwrap_or_else(Uuid::new_v4);

    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%path, "request exceeded the server deadline");
            let mut api = ApiError::new(
                KassaError::ServiceUnavailable("request deadline exceeded".into()),
                path,
                trace_id,
            );
            api.status = StatusCode::GATEWAY_TIMEOUT;
            api.into_response()
        }
    }
}
