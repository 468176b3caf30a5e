//! kassa-customer
//!
//! Customer service domain: sled-backed store and the lifecycle engine for
//! create/update/patch-state/change-password/delete/validate, with
//! optimistic concurrency on every mutation and domain events published
//! fire-and-forget.

pub mod service;
pub mod store;

pub use service::{
    CreateCustomer, CustomerListFilter, CustomerService, UpdateCustomer,
};
pub use store::CustomerStore;
