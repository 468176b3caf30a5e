use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use kassa_bus::EventPublisher;
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::event::{DomainEvent, EventPayload, MOVEMENT_EVENTS_TOPIC};
use kassa_core::movement::{Movement, MovementType};
use kassa_core::types::{AccountNumber, Money, MovementId};

use crate::store::{AccountStore, MovementDraft};

// ── Lock table ───────────────────────────────────────────────────────────────

/// Lazily grown table of per-key async locks. The movement engine locks per
/// account number; the lifecycle locks per customer for quota checks.
pub struct LockTable<K: Eq + Hash + Clone> {
    inner: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_key(&self, key: &K) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("lock table poisoned");
        Arc::clone(map.entry(key.clone()).or_default())
    }
}

impl<K: Eq + Hash + Clone> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostMovement {
    pub account_number: AccountNumber,
    pub movement_type: MovementType,
    pub amount: Money,
    pub transaction_id: String,
    pub idempotency_key: Option<String>,
    pub reversed_movement_id: Option<MovementId>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovementListFilter {
    pub account_number: Option<AccountNumber>,
    pub movement_type: Option<MovementType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: usize,
    pub size: usize,
}

/// Inclusive `[start 00:00:00, end 23:59:59]` UTC window.
pub(crate) fn date_window(
    start: NaiveDate,
    end: NaiveDate,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let from = start
        .and_hms_opt(0, 0, 0)
        .expect("midnight always exists")
        .and_utc();
    let to = end
        .and_hms_opt(23, 59, 59)
        .expect("end of day always exists")
        .and_utc();
    (from, to)
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// The movement posting engine.
///
/// Posts against one account are serialized by a per-account lock; the store
/// enforces the floor and the uniqueness claims again inside
/// `append_movement`, so prechecks that race still fail with the right
/// error. The `movement.created` event is fire-and-forget.
pub struct MovementEngine {
    store: Arc<AccountStore>,
    publisher: EventPublisher,
    locks: LockTable<AccountNumber>,
}

impl MovementEngine {
    pub fn new(store: Arc<AccountStore>, publisher: EventPublisher) -> Self {
        Self {
            store,
            publisher,
            locks: LockTable::new(),
        }
    }

    /// Validate and post one movement. See the pipeline ordering below; each
    /// step fails fast with a typed error.
    pub async fn post_movement(
        &self,
        ctx: &RequestContext,
        cmd: PostMovement,
    ) -> Result<Movement, KassaError> {
        // 1. Amount must be strictly positive.
        if cmd.amount <= Money::ZERO {
            return Err(KassaError::InvalidAmount);
        }
        if cmd.transaction_id.trim().is_empty() {
            return Err(KassaError::Validation(
                "transactionId must not be blank".into(),
            ));
        }

        // 2–3. Duplicate prechecks for fast, descriptive failures. The store
        // re-checks both under its uniqueness claims. The idempotency key is
        // checked first so an identical client retry reconciles against the
        // original movement instead of reporting a transaction clash.
        if let Some(key) = &cmd.idempotency_key {
            if let Some(existing) = self.store.movement_id_for_idempotency_key(key)? {
                return Err(KassaError::DuplicateIdempotencyKey {
                    key: key.clone(),
                    movement_id: existing,
                });
            }
        }
        if self
            .store
            .movement_id_for_transaction(&cmd.transaction_id)?
            .is_some()
        {
            return Err(KassaError::DuplicateTransaction(cmd.transaction_id));
        }

        // The critical section: everything from the account read to the
        // ledger append happens under this account's lock.
        let lock = self.locks.for_key(&cmd.account_number);
        let _guard = lock.lock().await;

        // 4. Account must exist and be active.
        let account = self
            .store
            .get_account(cmd.account_number)?
            .ok_or(KassaError::AccountNotFound(cmd.account_number))?;
        if !account.active {
            return Err(KassaError::AccountNotActive(cmd.account_number));
        }

        // 6. Reversal referential checks.
        let reversal_of = match cmd.movement_type {
            MovementType::Reversal => {
                let id = cmd.reversed_movement_id.ok_or_else(|| {
                    KassaError::InvalidReversal("reversedMovementId is required".into())
                })?;
                let original = self
                    .store
                    .get_movement(id)?
                    .ok_or_else(|| KassaError::InvalidReversal("original movement not found".into()))?;
                if original.account_number != cmd.account_number {
                    return Err(KassaError::InvalidReversal(
                        "original movement belongs to a different account".into(),
                    ));
                }
                if original.movement_type == MovementType::Reversal {
                    return Err(KassaError::InvalidReversal(
                        "a reversal cannot be reversed".into(),
                    ));
                }
                if original.reversed {
                    return Err(KassaError::InvalidReversal(
                        "movement is already reversed".into(),
                    ));
                }
                Some(original)
            }
            _ => {
                if cmd.reversed_movement_id.is_some() {
                    return Err(KassaError::Validation(
                        "reversedMovementId is only valid for REVERSAL movements".into(),
                    ));
                }
                None
            }
        };

        // 5 & 7. The store computes the balance columns, enforces the floor
        // and appends — one atomic unit under this lock.
        let draft = MovementDraft {
            movement_id: MovementId::new(),
            account_number: cmd.account_number,
            movement_type: cmd.movement_type,
            amount: cmd.amount,
            description: cmd.description,
            reference: cmd.reference,
            transaction_id: cmd.transaction_id,
            idempotency_key: cmd.idempotency_key,
            reversal_of,
            created_at: Utc::now(),
            request_id: ctx.request_id,
            correlation_id: ctx.correlation_id,
        };
        let (movement, _account) = self.store.append_movement(draft)?;
        drop(_guard);

        info!(
            movement_id = %movement.movement_id,
            account = movement.account_number,
            movement_type = %movement.movement_type,
            amount = %movement.amount,
            "movement posted"
        );

        // 8. Fire-and-forget event; failures never reach this command.
        self.publisher.publish(
            MOVEMENT_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::MovementCreated {
                    movement_id: movement.movement_id,
                    account_number: movement.account_number,
                    movement_type: movement.movement_type,
                    amount: movement.amount,
                    balance_after: movement.balance_after,
                    transaction_id: movement.transaction_id.clone(),
                },
            ),
        );

        // Return the persisted row rather than the staged one.
        self.store
            .get_movement(movement.movement_id)?
            .ok_or(KassaError::MovementNotFound(movement.movement_id))
    }

    /// Post the reversal of an existing movement. The server supplies the
    /// transaction id.
    pub async fn reverse_movement(
        &self,
        ctx: &RequestContext,
        movement_id: MovementId,
    ) -> Result<Movement, KassaError> {
        let original = self
            .store
            .get_movement(movement_id)?
            .ok_or(KassaError::MovementNotFound(movement_id))?;

        self.post_movement(
            ctx,
            PostMovement {
                account_number: original.account_number,
                movement_type: MovementType::Reversal,
                amount: original.amount,
                transaction_id: format!("REV-{}", Uuid::new_v4()),
                idempotency_key: None,
                reversed_movement_id: Some(movement_id),
                description: Some(format!("reversal of {}", original.transaction_id)),
                reference: None,
            },
        )
        .await
    }

    pub async fn get_movement(&self, id: MovementId) -> Result<Movement, KassaError> {
        self.store
            .get_movement(id)?
            .ok_or(KassaError::MovementNotFound(id))
    }

    /// Paged listing; an account filter is mandatory.
    pub async fn list_movements(
        &self,
        filter: MovementListFilter,
    ) -> Result<(Vec<Movement>, usize), KassaError> {
        let account = filter
            .account_number
            .ok_or_else(|| KassaError::Validation("accountNumber filter is required".into()))?;
        // A filter naming no account is a bad filter value, not a missing
        // resource: this listing answers 200 or 400, never 404.
        if self.store.get_account(account)?.is_none() {
            return Err(KassaError::Validation(format!(
                "accountNumber filter references no account: {account}"
            )));
        }

        let window = match (filter.start_date, filter.end_date) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(KassaError::Validation(
                        "startDate must not be after endDate".into(),
                    ));
                }
                Some(date_window(start, end))
            }
            (Some(start), None) => Some(date_window(start, NaiveDate::MAX)),
            (None, Some(end)) => Some(date_window(NaiveDate::MIN, end)),
            (None, None) => None,
        };

        let mut all = self.store.movements_for_account(account, window)?;
        if let Some(movement_type) = filter.movement_type {
            all.retain(|m| m.movement_type == movement_type);
        }

        let total = all.len();
        let size = if filter.size == 0 { 20 } else { filter.size };
        let start = filter.page.saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        Ok((all[start..end].to_vec(), total))
    }
}
