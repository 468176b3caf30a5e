//! Request/response DTOs. Monetary amounts travel as strings (exact
//! decimals); timestamps are RFC 3339.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kassa_core::account::{Account, AccountType};
use kassa_core::customer::{Customer, Person};
use kassa_core::movement::{Movement, MovementType};
use kassa_core::types::{AccountNumber, CustomerId, Money, MovementId, Version};

// ── Shared ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

fn default_page_size() -> usize {
    20
}

// ── Customer DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: String,
    pub identification: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl CreateCustomerRequest {
    pub fn into_person(self) -> (Person, String) {
        (
            Person {
                name: self.name,
                identification: self.identification,
                gender: self.gender,
                age: self.age,
                address: self.address,
                phone: self.phone,
                email: self.email,
            },
            self.password,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchStateRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub customer_id: CustomerId,
    pub name: String,
    pub identification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            customer_id: customer.customer_id,
            name: customer.person.name,
            identification: customer.person.identification,
            gender: customer.person.gender,
            age: customer.person.age,
            address: customer.person.address,
            phone: customer.person.phone,
            email: customer.person.email,
            active: customer.active,
            version: customer.version,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

// ── Account DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub initial_balance: Money,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_number: AccountNumber,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub account_type: AccountType,
    pub initial_balance: Money,
    pub current_balance: Money,
    pub active: bool,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_number: account.account_number,
            customer_id: account.customer_id,
            customer_name: account.customer_name,
            account_type: account.account_type,
            initial_balance: account.initial_balance,
            current_balance: account.current_balance,
            active: account.active,
            version: account.version,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub account_number: AccountNumber,
    pub current_balance: Money,
    pub active: bool,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountListQuery {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub state: Option<bool>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

// ── Movement DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMovementRequest {
    pub account_number: AccountNumber,
    pub movement_type: MovementType,
    pub amount: Money,
    pub transaction_id: String,
    #[serde(default)]
    pub reversed_movement_id: Option<MovementId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub movement_id: MovementId,
    pub account_number: AccountNumber,
    pub movement_type: MovementType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversed_movement_id: Option<MovementId>,
    pub reversed: bool,
    pub created_at: DateTime<Utc>,
    pub request_id: Uuid,
    pub correlation_id: Uuid,
}

impl From<Movement> for MovementResponse {
    fn from(movement: Movement) -> Self {
        Self {
            movement_id: movement.movement_id,
            account_number: movement.account_number,
            movement_type: movement.movement_type,
            amount: movement.amount,
            balance_before: movement.balance_before,
            balance_after: movement.balance_after,
            description: movement.description,
            reference: movement.reference,
            transaction_id: movement.transaction_id,
            idempotency_key: movement.idempotency_key,
            reversed_movement_id: movement.reversed_movement_id,
            reversed: movement.reversed,
            created_at: movement.created_at,
            request_id: movement.request_id,
            correlation_id: movement.correlation_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListQuery {
    pub account_number: Option<AccountNumber>,
    #[serde(default)]
    pub movement_type: Option<MovementType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

// ── Report DTOs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    #[serde(default)]
    pub account_number: Option<AccountNumber>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListQuery {
    #[serde(default)]
    pub state: Option<bool>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}
