use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;

/// Canonical error body returned by both services for every failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    pub trace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub rejected_value: Option<String>,
}

/// A domain error bound to the request it failed, ready to render.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
    pub path: String,
    pub trace_id: Uuid,
    pub errors: Option<Vec<FieldError>>,
}

/// Exhaustive kind → status mapping. Anything unclassified is a 500 and is
/// logged with its debug representation.
pub fn status_for(err: &KassaError) -> StatusCode {
    match err {
        KassaError::Validation(_)
        | KassaError::InvalidAmount
        | KassaError::CustomerNotActive(_)
        | KassaError::AccountNotActive(_) => StatusCode::BAD_REQUEST,

        KassaError::CustomerNotFound(_)
        | KassaError::AccountNotFound(_)
        | KassaError::MovementNotFound(_) => StatusCode::NOT_FOUND,

        KassaError::DuplicateTransaction(_)
        | KassaError::DuplicateIdempotencyKey { .. }
        | KassaError::VersionConflict { .. }
        | KassaError::CustomerAlreadyExists(_) => StatusCode::CONFLICT,

        KassaError::InsufficientBalance { .. }
        | KassaError::BusinessRule(_)
        | KassaError::InvalidReversal(_) => StatusCode::UNPROCESSABLE_ENTITY,

        KassaError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

        KassaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

        KassaError::Storage(_) | KassaError::Serialization(_) | KassaError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    pub fn new(err: KassaError, path: String, trace_id: Uuid) -> Self {
        let status = status_for(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(?err, %path, "unclassified error on request");
        }
        Self {
            status,
            kind: err.kind().to_string(),
            message: err.to_string(),
            path,
            trace_id,
            errors: None,
        }
    }

    /// A 400 with per-field failures.
    pub fn validation(path: String, trace_id: Uuid, errors: Vec<FieldError>) -> Self {
        let message = errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "VALIDATION_ERROR".into(),
            message,
            path,
            trace_id,
            errors: Some(errors),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            timestamp: Utc::now(),
            status: self.status.as_u16(),
            error: self.kind.clone(),
            message: self.message.clone(),
            path: self.path.clone(),
            trace_id: self.trace_id,
            errors: self.errors.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

// ── Request metadata extractor ───────────────────────────────────────────────

/// Per-request context captured by the tracing middleware, plus the path.
/// Handlers use it both to call the domain and to bind errors to the
/// request.
#[derive(Clone)]
pub struct Meta {
    pub ctx: RequestContext,
    pub path: String,
}

impl Meta {
    pub fn fail(&self, err: KassaError) -> ApiError {
        ApiError::new(err, self.path.clone(), self.ctx.correlation_id)
    }

    pub fn invalid(&self, errors: Vec<FieldError>) -> ApiError {
        ApiError::validation(self.path.clone(), self.ctx.correlation_id, errors)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Meta {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();
        Ok(Meta { ctx, path })
    }
}
