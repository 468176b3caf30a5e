use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;
use kassa_customer::{CreateCustomer, CustomerListFilter, CustomerService, UpdateCustomer};

use crate::error::{ApiError, FieldError, Meta};
use crate::middleware::{self, AuthState};
use crate::types::{
    ChangePasswordRequest, CreateCustomerRequest, CustomerListQuery, CustomerResponse, Page,
    PatchStateRequest, UpdateCustomerRequest,
};

#[derive(Clone)]
pub struct CustomerApiState {
    pub service: Arc<CustomerService>,
    pub auth: AuthState,
}

/// The Customer service HTTP surface under `/api/v1`.
pub fn customer_router(
    state: CustomerApiState,
    cors: CorsLayer,
    deadline: Duration,
) -> Router {
    Router::new()
        .route(
            "/api/v1/customers",
            post(create_customer).get(list_customers),
        )
        .route(
            "/api/v1/customers/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
        .route("/api/v1/customers/:id/state", patch(patch_state))
        .route("/api/v1/customers/:id/password", put(change_password))
        .route("/api/v1/customers/:id/validate", get(validate_customer))
        .route("/health", get(health))
        .layer(
            tower::ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(move |req, next| {
                    middleware::soft_deadline(deadline, req, next)
                }))
                .layer(axum::middleware::from_fn(middleware::trace_context))
                .layer(axum::middleware::from_fn_with_state(
                    state.auth.clone(),
                    middleware::require_auth,
                )),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "UP" }))
}

fn parse_customer_id(meta: &Meta, raw: &str) -> Result<CustomerId, ApiError> {
    raw.parse()
        .map_err(|_| meta.fail(KassaError::Validation("customerId must be a UUID".into())))
}

async fn create_customer(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();
    if req.name.trim().is_empty() {
        errors.push(FieldError {
            field: "name".into(),
            message: "must not be blank".into(),
            rejected_value: Some(req.name.clone()),
        });
    }
    if req.identification.trim().is_empty() {
        errors.push(FieldError {
            field: "identification".into(),
            message: "must not be blank".into(),
            rejected_value: Some(req.identification.clone()),
        });
    }
    if req.password.is_empty() {
        errors.push(FieldError {
            field: "password".into(),
            message: "must not be blank".into(),
            rejected_value: None,
        });
    }
    if !errors.is_empty() {
        return Err(meta.invalid(errors));
    }

    let (person, password) = req.into_person();
    let customer = state
        .service
        .create(&meta.ctx, CreateCustomer { person, password })
        .await
        .map_err(|e| meta.fail(e))?;

    let location = format!("/api/v1/customers/{}", customer.customer_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(CustomerResponse::from(customer)),
    ))
}

async fn get_customer(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    let customer = state.service.get(id).await.map_err(|e| meta.fail(e))?;
    Ok(Json(customer.into()))
}

async fn list_customers(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<Page<CustomerResponse>>, ApiError> {
    let (customers, total) = state
        .service
        .list(CustomerListFilter {
            active: query.state,
            page: query.page,
            size: query.size,
        })
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(Page {
        items: customers.into_iter().map(CustomerResponse::from).collect(),
        page: query.page,
        size: query.size,
        total,
    }))
}

async fn update_customer(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    let customer = state
        .service
        .update(
            &meta.ctx,
            id,
            UpdateCustomer {
                name: req.name,
                gender: req.gender,
                age: req.age,
                address: req.address,
                phone: req.phone,
                email: req.email,
                expected_version: req.version,
            },
        )
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(customer.into()))
}

async fn patch_state(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
    Json(req): Json<PatchStateRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    let customer = state
        .service
        .set_state(&meta.ctx, id, req.active)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(customer.into()))
}

async fn change_password(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    let customer = state
        .service
        .change_password(&meta.ctx, id, &req.password)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(customer.into()))
}

async fn delete_customer(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    state
        .service
        .delete(&meta.ctx, id)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Peer endpoint for §4.3: 200 when active, 400 when inactive, 404 when
/// missing.
async fn validate_customer(
    State(state): State<CustomerApiState>,
    meta: Meta,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let id = parse_customer_id(&meta, &id)?;
    let customer = state.service.validate(id).await.map_err(|e| meta.fail(e))?;
    Ok(Json(customer.into()))
}
