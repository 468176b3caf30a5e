pub mod account;
pub mod constants;
pub mod context;
pub mod customer;
pub mod error;
pub mod event;
pub mod movement;
pub mod types;

pub use account::{Account, AccountType};
pub use constants::*;
pub use context::RequestContext;
pub use customer::{Customer, Person};
pub use error::KassaError;
pub use event::{
    DomainEvent, EventHeaders, EventPayload, ACCOUNT_EVENTS_TOPIC, CUSTOMER_EVENTS_TOPIC,
    MOVEMENT_EVENTS_TOPIC,
};
pub use movement::{Movement, MovementType};
pub use types::*;
