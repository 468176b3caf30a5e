use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use kassa_bus::EventPublisher;
use kassa_core::account::{Account, AccountType};
use kassa_core::constants::MAX_ACTIVE_ACCOUNTS_PER_CUSTOMER;
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::event::{DomainEvent, EventPayload, ACCOUNT_EVENTS_TOPIC};
use kassa_core::types::{AccountNumber, CustomerId, Money, Version};

use crate::directory::CustomerDirectory;
use crate::movement::LockTable;
use crate::store::AccountStore;

#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub initial_balance: Money,
}

/// Only `account_type` and `active` are mutable. Balance and ownership are
/// not reachable through updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    pub account_type: Option<AccountType>,
    pub active: Option<bool>,
    pub expected_version: Option<Version>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountListFilter {
    pub customer_id: Option<CustomerId>,
    pub account_type: Option<AccountType>,
    pub active: Option<bool>,
    pub page: usize,
    pub size: usize,
}

/// Account lifecycle: create (validated and event-driven), update, state
/// toggle, delete, and the sovereign per-customer cascade.
pub struct AccountLifecycle {
    store: Arc<AccountStore>,
    publisher: EventPublisher,
    customers: Arc<dyn CustomerDirectory>,
    /// Serializes quota checks per customer so two concurrent creations
    /// cannot both pass the count.
    customer_locks: LockTable<CustomerId>,
}

impl AccountLifecycle {
    pub fn new(
        store: Arc<AccountStore>,
        publisher: EventPublisher,
        customers: Arc<dyn CustomerDirectory>,
    ) -> Self {
        Self {
            store,
            publisher,
            customers,
            customer_locks: LockTable::new(),
        }
    }

    /// The validated path: the customer must exist and be active on the
    /// Customer service before anything is written here.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        cmd: CreateAccount,
    ) -> Result<Account, KassaError> {
        if cmd.initial_balance < Money::ZERO {
            return Err(KassaError::Validation(
                "initialBalance must not be negative".into(),
            ));
        }
        let customer = self.customers.validate_customer(ctx, cmd.customer_id).await?;
        self.create_unchecked(
            ctx,
            cmd.customer_id,
            customer.name,
            cmd.account_type,
            cmd.initial_balance,
        )
        .await
    }

    /// The event-driven path: a `customer.created` event already establishes
    /// the customer, so no peer call is made. Quota checks still apply, and
    /// they are what makes redelivery a no-op.
    pub async fn create_unchecked(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        customer_name: String,
        account_type: AccountType,
        initial_balance: Money,
    ) -> Result<Account, KassaError> {
        if initial_balance < Money::ZERO {
            return Err(KassaError::Validation(
                "initialBalance must not be negative".into(),
            ));
        }

        let lock = self.customer_locks.for_key(&customer_id);
        let _guard = lock.lock().await;

        self.enforce_quotas(customer_id, account_type, None)?;

        let account_number = self.store.next_account_number()?;
        let account = Account::new(
            account_number,
            customer_id,
            customer_name,
            account_type,
            initial_balance,
            Utc::now(),
        );
        self.store.put_account(&account)?;
        drop(_guard);

        info!(
            account = account.account_number,
            customer_id = %customer_id,
            account_type = %account_type,
            "account created"
        );
        self.publisher.publish(
            ACCOUNT_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::AccountCreated {
                    account_number: account.account_number,
                    customer_id: account.customer_id,
                    account_type: account.account_type,
                    initial_balance: account.initial_balance,
                    active: account.active,
                },
            ),
        );
        Ok(account)
    }

    pub async fn get(&self, number: AccountNumber) -> Result<Account, KassaError> {
        self.store
            .get_account(number)?
            .ok_or(KassaError::AccountNotFound(number))
    }

    pub async fn list(
        &self,
        filter: AccountListFilter,
    ) -> Result<(Vec<Account>, usize), KassaError> {
        let size = if filter.size == 0 { 20 } else { filter.size };
        self.store.list_accounts(
            filter.customer_id,
            filter.account_type,
            filter.active,
            filter.page,
            size,
        )
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        number: AccountNumber,
        cmd: UpdateAccount,
    ) -> Result<Account, KassaError> {
        let current = self.get(number).await?;
        if let Some(expected) = cmd.expected_version {
            if expected != current.version {
                return Err(KassaError::VersionConflict {
                    expected,
                    actual: current.version,
                });
            }
        }

        let lock = self.customer_locks.for_key(&current.customer_id);
        let _guard = lock.lock().await;

        let mut updated = current.clone();
        if let Some(account_type) = cmd.account_type {
            updated.account_type = account_type;
        }
        if let Some(active) = cmd.active {
            updated.active = active;
        }

        // Re-activating or re-typing must not break the per-customer
        // invariants.
        if updated.active
            && (updated.account_type != current.account_type || !current.active)
        {
            self.enforce_quotas(current.customer_id, updated.account_type, Some(number))?;
        }

        updated.touch(Utc::now());
        self.store.update_account_versioned(&current, &updated)?;
        drop(_guard);

        self.publish_updated(ctx, &updated);
        Ok(updated)
    }

    pub async fn set_state(
        &self,
        ctx: &RequestContext,
        number: AccountNumber,
        active: bool,
    ) -> Result<Account, KassaError> {
        self.update(
            ctx,
            number,
            UpdateAccount {
                active: Some(active),
                ..UpdateAccount::default()
            },
        )
        .await
    }

    /// Client-facing delete: refused while money is still on the account.
    pub async fn delete(&self, ctx: &RequestContext, number: AccountNumber) -> Result<(), KassaError> {
        let account = self.get(number).await?;
        if account.current_balance != Money::ZERO {
            return Err(KassaError::BusinessRule(
                "account balance must be zero before deletion".into(),
            ));
        }
        self.remove_and_publish(ctx, &account)
    }

    /// Event-driven cascade: customer deletion is sovereign, so the balance
    /// check is skipped. Idempotent — deleting a customer with no accounts
    /// succeeds silently. Returns the number of accounts removed.
    pub async fn delete_for_customer(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<usize, KassaError> {
        let accounts = self.store.accounts_for_customer(customer_id)?;
        if accounts.is_empty() {
            debug!(customer_id = %customer_id, "no accounts to cascade-delete");
            return Ok(0);
        }
        let count = accounts.len();
        for account in accounts {
            self.remove_and_publish(ctx, &account)?;
        }
        info!(customer_id = %customer_id, count, "cascade-deleted accounts for customer");
        Ok(count)
    }

    fn remove_and_publish(&self, ctx: &RequestContext, account: &Account) -> Result<(), KassaError> {
        let movements = self.store.delete_account_cascade(account.account_number)?;
        info!(
            account = account.account_number,
            movements, "account deleted"
        );
        self.publisher.publish(
            ACCOUNT_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::AccountDeleted {
                    account_number: account.account_number,
                    customer_id: account.customer_id,
                },
            ),
        );
        Ok(())
    }

    /// `excluding` skips the account being updated so a no-op state write
    /// does not trip over itself.
    fn enforce_quotas(
        &self,
        customer_id: CustomerId,
        account_type: AccountType,
        excluding: Option<AccountNumber>,
    ) -> Result<(), KassaError> {
        let accounts = self.store.accounts_for_customer(customer_id)?;
        let active: Vec<_> = accounts
            .iter()
            .filter(|a| a.active && Some(a.account_number) != excluding)
            .collect();

        if active.len() >= MAX_ACTIVE_ACCOUNTS_PER_CUSTOMER {
            return Err(KassaError::BusinessRule(format!(
                "customer already has {MAX_ACTIVE_ACCOUNTS_PER_CUSTOMER} active accounts"
            )));
        }
        if active.iter().any(|a| a.account_type == account_type) {
            return Err(KassaError::BusinessRule(format!(
                "customer already has an active {account_type} account"
            )));
        }
        Ok(())
    }

    fn publish_updated(&self, ctx: &RequestContext, account: &Account) {
        // Built from the persisted row, so `accountType` is always set.
        self.publisher.publish(
            ACCOUNT_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::AccountUpdated {
                    account_number: account.account_number,
                    customer_id: account.customer_id,
                    account_type: account.account_type,
                    active: account.active,
                },
            ),
        );
    }
}
