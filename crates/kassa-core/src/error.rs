use thiserror::Error;

use crate::types::{AccountNumber, CustomerId, Money, MovementId, Version};

/// Domain error taxonomy shared by both services.
///
/// Every variant maps to a stable machine-readable kind (see [`KassaError::kind`])
/// which the HTTP layer translates into a status code and a canonical error
/// body. Infrastructure failures (store, wire, peer transport) are converted
/// into these kinds exactly once, at the adapter that observed them.
#[derive(Debug, Error)]
pub enum KassaError {
    // ── Input validation ─────────────────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    // ── Lookups ──────────────────────────────────────────────────────────────
    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("customer is not active: {0}")]
    CustomerNotActive(CustomerId),

    #[error("account not found: {0}")]
    AccountNotFound(AccountNumber),

    #[error("account is not active: {0}")]
    AccountNotActive(AccountNumber),

    #[error("movement not found: {0}")]
    MovementNotFound(MovementId),

    // ── Uniqueness / concurrency conflicts ───────────────────────────────────
    #[error("a movement with transaction id {0} already exists")]
    DuplicateTransaction(String),

    #[error("idempotency key {key} is already bound to movement {movement_id}")]
    DuplicateIdempotencyKey {
        key: String,
        movement_id: MovementId,
    },

    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: Version, actual: Version },

    #[error("a customer with identification {0} already exists")]
    CustomerAlreadyExists(String),

    // ── Business rules ───────────────────────────────────────────────────────
    #[error("insufficient balance: have {current}, requested {requested}, floor {floor}")]
    InsufficientBalance {
        current: Money,
        requested: Money,
        floor: Money,
    },

    #[error("{0}")]
    BusinessRule(String),

    #[error("invalid reversal: {0}")]
    InvalidReversal(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KassaError {
    /// Stable machine-readable kind, surfaced in the `error` field of the
    /// canonical HTTP error body and in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            KassaError::Validation(_) => "VALIDATION_ERROR",
            KassaError::InvalidAmount => "INVALID_AMOUNT",
            KassaError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            KassaError::CustomerNotActive(_) => "CUSTOMER_NOT_ACTIVE",
            KassaError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            KassaError::AccountNotActive(_) => "ACCOUNT_NOT_ACTIVE",
            KassaError::MovementNotFound(_) => "MOVEMENT_NOT_FOUND",
            KassaError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            KassaError::DuplicateIdempotencyKey { .. } => "DUPLICATE_IDEMPOTENCY_KEY",
            KassaError::VersionConflict { .. } => "VERSION_CONFLICT",
            KassaError::CustomerAlreadyExists(_) => "CUSTOMER_ALREADY_EXISTS",
            KassaError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            KassaError::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            KassaError::InvalidReversal(_) => "INVALID_REVERSAL",
            KassaError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            KassaError::Unauthorized(_) => "UNAUTHORIZED",
            KassaError::Storage(_) | KassaError::Serialization(_) | KassaError::Internal(_) => {
                "INTERNAL"
            }
        }
    }
}
