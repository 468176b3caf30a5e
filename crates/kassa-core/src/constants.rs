//! Business constants shared by both services.

use crate::types::Money;

/// Most negative balance a DEBIT may leave behind, in whole units.
/// Enforced in the domain layer and again inside the store's posting path.
pub const OVERDRAFT_FLOOR_UNITS: i64 = -10_000;

/// Maximum simultaneously active accounts per customer.
pub const MAX_ACTIVE_ACCOUNTS_PER_CUSTOMER: usize = 5;

/// First account number handed out by a fresh store.
pub const ACCOUNT_NUMBER_SEED: u64 = 100_000;

/// Version stamped into the `schema-version` header of every published event.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Capacity of the in-process publish queue drained by the publisher worker.
pub const PUBLISH_QUEUE_CAPACITY: usize = 512;

/// The overdraft floor as a `Money` value.
pub fn overdraft_floor() -> Money {
    Money::from(OVERDRAFT_FLOOR_UNITS)
}
