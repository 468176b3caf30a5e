//! kassa-account
//!
//! Account service domain: the sled-backed account/movement store, the
//! movement posting engine, account lifecycle with per-customer quotas, the
//! statement/report engine and the customer-event handlers that keep this
//! service consistent with the Customer service.

pub mod directory;
pub mod events;
pub mod lifecycle;
pub mod movement;
pub mod statement;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use directory::CustomerDirectory;
pub use events::CustomerEventHandler;
pub use lifecycle::{AccountLifecycle, AccountListFilter, CreateAccount, UpdateAccount};
pub use movement::{MovementEngine, MovementListFilter, PostMovement};
pub use statement::{
    AccountStatement, CustomerStatement, MovementsSummary, StatementEngine, StatementTotals,
    SummaryFilter,
};
pub use store::{AccountStore, MovementDraft};
