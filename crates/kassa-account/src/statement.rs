use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use kassa_core::account::AccountType;
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::movement::{Movement, MovementType};
use kassa_core::types::{AccountNumber, CustomerId, Money};

use crate::directory::CustomerDirectory;
use crate::movement::date_window;
use crate::store::AccountStore;

// ── Output shapes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub active: bool,
    /// Balance the account had when the period opened, reconstructed as
    /// `current_balance − Σ signed_effect(movements in period)`.
    pub initial_balance_for_period: Money,
    pub final_balance_for_period: Money,
    pub movements: Vec<Movement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTotals {
    pub total_credits: Money,
    pub total_debits: Money,
    pub total_movements: usize,
    pub net_change: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStatement {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub accounts: Vec<AccountStatement>,
    pub totals: StatementTotals,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub account_number: Option<AccountNumber>,
    pub customer_id: Option<CustomerId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsSummary {
    pub total_movements: usize,
    pub total_credits: Money,
    pub total_debits: Money,
    pub total_reversals: Money,
    pub average_amount: Money,
    pub min_amount: Money,
    pub max_amount: Money,
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Read-only reporting over the ledger. Deterministic given the stored
/// state; never writes.
pub struct StatementEngine {
    store: Arc<AccountStore>,
    customers: Arc<dyn CustomerDirectory>,
}

impl StatementEngine {
    pub fn new(store: Arc<AccountStore>, customers: Arc<dyn CustomerDirectory>) -> Self {
        Self { store, customers }
    }

    /// Per-account statements plus cross-account totals over the inclusive
    /// `[start 00:00:00, end 23:59:59]` window.
    pub async fn account_statement(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<CustomerStatement, KassaError> {
        if start_date > end_date {
            return Err(KassaError::Validation(
                "startDate must not be after endDate".into(),
            ));
        }
        let customer = self.customers.validate_customer(ctx, customer_id).await?;

        let window = date_window(start_date, end_date);
        let mut statements = Vec::new();
        let mut total_credits = Money::ZERO;
        let mut total_debits = Money::ZERO;
        let mut total_movements = 0;

        for account in self.store.accounts_for_customer(customer_id)? {
            let movements = self
                .store
                .movements_for_account(account.account_number, Some(window))?;

            let period_effect: Money = movements.iter().map(|m| m.signed_effect()).sum();
            for movement in &movements {
                let effect = movement.signed_effect();
                if effect >= Money::ZERO {
                    total_credits += effect;
                } else {
                    total_debits += -effect;
                }
            }
            total_movements += movements.len();

            statements.push(AccountStatement {
                account_number: account.account_number,
                account_type: account.account_type,
                active: account.active,
                initial_balance_for_period: account.current_balance - period_effect,
                final_balance_for_period: account.current_balance,
                movements,
            });
        }

        Ok(CustomerStatement {
            customer_id,
            customer_name: customer.name,
            start_date,
            end_date,
            accounts: statements,
            totals: StatementTotals {
                total_credits,
                total_debits,
                total_movements,
                net_change: total_credits - total_debits,
            },
        })
    }

    /// Reduced aggregate form. At least one of the account/customer filters
    /// is required.
    pub async fn movements_summary(
        &self,
        filter: SummaryFilter,
    ) -> Result<MovementsSummary, KassaError> {
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

        let accounts = match (filter.account_number, filter.customer_id) {
            (Some(number), _) => {
                if self.store.get_account(number)?.is_none() {
                    return Err(KassaError::AccountNotFound(number));
                }
                vec![number]
            }
            (None, Some(customer_id)) => self
                .store
                .accounts_for_customer(customer_id)?
                .into_iter()
                .map(|a| a.account_number)
                .collect(),
            (None, None) => {
                return Err(KassaError::Validation(
                    "either accountNumber or customerId is required".into(),
                ))
            }
        };

        let mut movements = Vec::new();
        for number in accounts {
            movements.extend(self.store.movements_for_account(number, window)?);
        }

        let mut total_credits = Money::ZERO;
        let mut total_debits = Money::ZERO;
        let mut total_reversals = Money::ZERO;
        let mut amount_sum = Money::ZERO;
        let mut min_amount: Option<Money> = None;
        let mut max_amount: Option<Money> = None;

        for movement in &movements {
            match movement.movement_type {
                MovementType::Credit => total_credits += movement.amount,
                MovementType::Debit => total_debits += movement.amount,
                MovementType::Reversal => total_reversals += movement.amount,
            }
            amount_sum += movement.amount;
            min_amount = Some(min_amount.map_or(movement.amount, |m| m.min(movement.amount)));
            max_amount = Some(max_amount.map_or(movement.amount, |m| m.max(movement.amount)));
        }

        let count = movements.len();
        let average = if count == 0 {
            Money::ZERO
        } else {
            amount_sum / Money::from(count as i64)
        };

        Ok(MovementsSummary {
            total_movements: count,
            total_credits,
            total_debits,
            total_reversals,
            average_amount: average,
            min_amount: min_amount.unwrap_or(Money::ZERO),
            max_amount: max_amount.unwrap_or(Money::ZERO),
        })
    }
}
