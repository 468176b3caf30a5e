//! Account entity owned by the Account service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{AccountNumber, CustomerId, Money, Timestamp, Version};

/// The two supported account products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Checking => "CHECKING",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CHECKING" => Ok(AccountType::Checking),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// A customer-owned balance container with an append-only ledger of
/// movements behind it.
///
/// `customer_id` is a weak reference — the Customer service owns that entity
/// and consistency is reconciled through domain events, not foreign keys.
/// `current_balance` and `version` are mutated exclusively by the movement
/// posting path and the lifecycle compare-and-swap; update commands never
/// touch the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_number: AccountNumber,
    pub customer_id: CustomerId,
    /// Denormalised display-name cache, captured when the account is opened.
    pub customer_name: String,
    pub account_type: AccountType,
    /// Immutable after creation. Never negative.
    pub initial_balance: Money,
    pub current_balance: Money,
    pub active: bool,
    pub version: Version,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    pub fn new(
        account_number: AccountNumber,
        customer_id: CustomerId,
        customer_name: String,
        account_type: AccountType,
        initial_balance: Money,
        now: Timestamp,
    ) -> Self {
        Self {
            account_number,
            customer_id,
            customer_name,
            account_type,
            initial_balance,
            current_balance: initial_balance,
            active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.version += 1;
        self.updated_at = now;
    }
}
