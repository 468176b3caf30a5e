use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use kassa_account::{
    AccountLifecycle, AccountListFilter, CreateAccount, MovementEngine, MovementListFilter,
    PostMovement, StatementEngine, SummaryFilter, UpdateAccount,
};
use kassa_core::error::KassaError;
use kassa_core::types::{AccountNumber, CustomerId, MovementId};

use crate::error::{ApiError, Meta};
use crate::middleware::{self, AuthState, IDEMPOTENCY_KEY_HEADER};
use crate::types::{
    AccountListQuery, AccountResponse, BalanceResponse, CreateAccountRequest, MovementListQuery,
    MovementResponse, Page, PatchStateRequest, PostMovementRequest, StatementQuery, SummaryQuery,
    UpdateAccountRequest,
};

#[derive(Clone)]
pub struct AccountApiState {
    pub lifecycle: Arc<AccountLifecycle>,
    pub movements: Arc<MovementEngine>,
    pub statements: Arc<StatementEngine>,
    pub auth: AuthState,
}

/// The Account service HTTP surface under `/api/v1`.
pub fn account_router(state: AccountApiState, cors: CorsLayer, deadline: Duration) -> Router {
    Router::new()
        .route("/api/v1/accounts", post(create_account).get(list_accounts))
        .route(
            "/api/v1/accounts/:number",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/api/v1/accounts/:number/state", patch(patch_account_state))
        .route("/api/v1/accounts/:number/balance", get(account_balance))
        .route(
            "/api/v1/movements",
            post(post_movement).get(list_movements),
        )
        .route("/api/v1/movements/:id", get(get_movement))
        .route("/api/v1/movements/:id/reverse", post(reverse_movement))
        .route(
            "/api/v1/reports/account-statement/:customer_id",
            get(account_statement),
        )
        .route("/api/v1/reports/movements-summary", get(movements_summary))
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

fn parse_account_number(meta: &Meta, raw: &str) -> Result<AccountNumber, ApiError> {
    raw.parse()
        .map_err(|_| meta.fail(KassaError::Validation("accountNumber must be numeric".into())))
}

fn parse_movement_id(meta: &Meta, raw: &str) -> Result<MovementId, ApiError> {
    raw.parse()
        .map_err(|_| meta.fail(KassaError::Validation("movementId must be a UUID".into())))
}

// ── Accounts ─────────────────────────────────────────────────────────────────

async fn create_account(
    State(state): State<AccountApiState>,
    meta: Meta,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .lifecycle
        .create(
            &meta.ctx,
            CreateAccount {
                customer_id: req.customer_id,
                account_type: req.account_type,
                initial_balance: req.initial_balance,
            },
        )
        .await
        .map_err(|e| meta.fail(e))?;

    let location = format!("/api/v1/accounts/{}", account.account_number);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(AccountResponse::from(account)),
    ))
}

async fn get_account(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(number): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let number = parse_account_number(&meta, &number)?;
    let account = state.lifecycle.get(number).await.map_err(|e| meta.fail(e))?;
    Ok(Json(account.into()))
}

async fn list_accounts(
    State(state): State<AccountApiState>,
    meta: Meta,
    Query(query): Query<AccountListQuery>,
) -> Result<Json<Page<AccountResponse>>, ApiError> {
    let (accounts, total) = state
        .lifecycle
        .list(AccountListFilter {
            customer_id: query.customer_id,
            account_type: query.account_type,
            active: query.state,
            page: query.page,
            size: query.size,
        })
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(Page {
        items: accounts.into_iter().map(AccountResponse::from).collect(),
        page: query.page,
        size: query.size,
        total,
    }))
}

async fn update_account(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(number): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let number = parse_account_number(&meta, &number)?;
    let account = state
        .lifecycle
        .update(
            &meta.ctx,
            number,
            UpdateAccount {
                account_type: req.account_type,
                active: req.active,
                expected_version: req.version,
            },
        )
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(account.into()))
}

async fn patch_account_state(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(number): Path<String>,
    Json(req): Json<PatchStateRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let number = parse_account_number(&meta, &number)?;
    let account = state
        .lifecycle
        .set_state(&meta.ctx, number, req.active)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(account.into()))
}

async fn delete_account(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(number): Path<String>,
) -> Result<StatusCode, ApiError> {
    let number = parse_account_number(&meta, &number)?;
    state
        .lifecycle
        .delete(&meta.ctx, number)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn account_balance(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(number): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let number = parse_account_number(&meta, &number)?;
    let account = state.lifecycle.get(number).await.map_err(|e| meta.fail(e))?;
    Ok(Json(BalanceResponse {
        account_number: account.account_number,
        current_balance: account.current_balance,
        active: account.active,
        as_of: Utc::now(),
    }))
}

// ── Movements ────────────────────────────────────────────────────────────────

async fn post_movement(
    State(state): State<AccountApiState>,
    meta: Meta,
    headers: HeaderMap,
    Json(req): Json<PostMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => {
            let raw = value.to_str().ok().map(str::to_string).ok_or_else(|| {
                meta.fail(KassaError::Validation(
                    "Idempotency-Key header must be a UUID".into(),
                ))
            })?;
            if Uuid::parse_str(&raw).is_err() {
                return Err(meta.fail(KassaError::Validation(
                    "Idempotency-Key header must be a UUID".into(),
                )));
            }
            Some(raw)
        }
        None => None,
    };

    let movement = state
        .movements
        .post_movement(
            &meta.ctx,
            PostMovement {
                account_number: req.account_number,
                movement_type: req.movement_type,
                amount: req.amount,
                transaction_id: req.transaction_id,
                idempotency_key,
                reversed_movement_id: req.reversed_movement_id,
                description: req.description,
                reference: req.reference,
            },
        )
        .await
        .map_err(|e| meta.fail(e))?;

    let location = format!("/api/v1/movements/{}", movement.movement_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovementResponse::from(movement)),
    ))
}

async fn get_movement(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(id): Path<String>,
) -> Result<Json<MovementResponse>, ApiError> {
    let id = parse_movement_id(&meta, &id)?;
    let movement = state
        .movements
        .get_movement(id)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(movement.into()))
}

async fn list_movements(
    State(state): State<AccountApiState>,
    meta: Meta,
    Query(query): Query<MovementListQuery>,
) -> Result<Json<Page<MovementResponse>>, ApiError> {
    let (movements, total) = state
        .movements
        .list_movements(MovementListFilter {
            account_number: query.account_number,
            movement_type: query.movement_type,
            start_date: query.start_date,
            end_date: query.end_date,
            page: query.page,
            size: query.size,
        })
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(Page {
        items: movements.into_iter().map(MovementResponse::from).collect(),
        page: query.page,
        size: query.size,
        total,
    }))
}

async fn reverse_movement(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_movement_id(&meta, &id)?;
    let movement = state
        .movements
        .reverse_movement(&meta.ctx, id)
        .await
        .map_err(|e| meta.fail(e))?;

    let location = format!("/api/v1/movements/{}", movement.movement_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovementResponse::from(movement)),
    ))
}

// ── Reports ──────────────────────────────────────────────────────────────────

async fn account_statement(
    State(state): State<AccountApiState>,
    meta: Meta,
    Path(customer_id): Path<String>,
    Query(query): Query<StatementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let customer_id: CustomerId = customer_id
        .parse()
        .map_err(|_| meta.fail(KassaError::Validation("customerId must be a UUID".into())))?;
    let statement = state
        .statements
        .account_statement(&meta.ctx, customer_id, query.start_date, query.end_date)
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(statement))
}

async fn movements_summary(
    State(state): State<AccountApiState>,
    meta: Meta,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .statements
        .movements_summary(SummaryFilter {
            account_number: query.account_number,
            customer_id: query.customer_id,
            start_date: query.start_date,
            end_date: query.end_date,
        })
        .await
        .map_err(|e| meta.fail(e))?;
    Ok(Json(summary))
}
