//! Domain event envelope and payloads.
//!
//! Events cross the wire as JSON with a stable `eventType` discriminator in
//! `domain.verb` form. Consumers tolerate unknown types by decoding the
//! envelope lazily (see `kassa-bus`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountType;
use crate::movement::MovementType;
use crate::types::{AccountNumber, CustomerId, EventId, Money, MovementId};

/// Topic owned by the Customer service.
pub const CUSTOMER_EVENTS_TOPIC: &str = "banking.customer.events";
/// Topics owned by the Account service.
pub const ACCOUNT_EVENTS_TOPIC: &str = "banking.account.events";
pub const MOVEMENT_EVENTS_TOPIC: &str = "banking.movement.events";

// ── Envelope ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(correlation_id: Uuid, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            correlation_id,
            payload,
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum EventPayload {
    #[serde(rename = "customer.created", rename_all = "camelCase")]
    CustomerCreated {
        customer_id: CustomerId,
        identification: String,
        name: String,
        active: bool,
    },

    #[serde(rename = "customer.updated", rename_all = "camelCase")]
    CustomerUpdated {
        customer_id: CustomerId,
        identification: String,
        name: String,
        active: bool,
    },

    #[serde(rename = "customer.deleted", rename_all = "camelCase")]
    CustomerDeleted {
        customer_id: CustomerId,
        identification: String,
    },

    #[serde(rename = "account.created", rename_all = "camelCase")]
    AccountCreated {
        account_number: AccountNumber,
        customer_id: CustomerId,
        account_type: AccountType,
        initial_balance: Money,
        active: bool,
    },

    /// `account_type` is always populated from the persisted row.
    #[serde(rename = "account.updated", rename_all = "camelCase")]
    AccountUpdated {
        account_number: AccountNumber,
        customer_id: CustomerId,
        account_type: AccountType,
        active: bool,
    },

    #[serde(rename = "account.deleted", rename_all = "camelCase")]
    AccountDeleted {
        account_number: AccountNumber,
        customer_id: CustomerId,
    },

    #[serde(rename = "movement.created", rename_all = "camelCase")]
    MovementCreated {
        movement_id: MovementId,
        account_number: AccountNumber,
        movement_type: MovementType,
        amount: Money,
        balance_after: Money,
        transaction_id: String,
    },
}

impl EventPayload {
    /// The `domain.verb` discriminator, also written to the `event-type`
    /// record header.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::CustomerCreated { .. } => "customer.created",
            EventPayload::CustomerUpdated { .. } => "customer.updated",
            EventPayload::CustomerDeleted { .. } => "customer.deleted",
            EventPayload::AccountCreated { .. } => "account.created",
            EventPayload::AccountUpdated { .. } => "account.updated",
            EventPayload::AccountDeleted { .. } => "account.deleted",
            EventPayload::MovementCreated { .. } => "movement.created",
        }
    }

    /// Natural entity identifier, written to the `entity-id` header.
    pub fn entity_id(&self) -> String {
        match self {
            EventPayload::CustomerCreated { customer_id, .. }
            | EventPayload::CustomerUpdated { customer_id, .. }
            | EventPayload::CustomerDeleted { customer_id, .. } => customer_id.to_string(),
            EventPayload::AccountCreated { account_number, .. }
            | EventPayload::AccountUpdated { account_number, .. }
            | EventPayload::AccountDeleted { account_number, .. }
            | EventPayload::MovementCreated { account_number, .. } => account_number.to_string(),
        }
    }

    /// Partition key. Customer events key on the national identification,
    /// account and movement events on the account number, so one entity's
    /// events stay ordered on one partition.
    pub fn partition_key(&self) -> String {
        match self {
            EventPayload::CustomerCreated { identification, .. }
            | EventPayload::CustomerUpdated { identification, .. }
            | EventPayload::CustomerDeleted { identification, .. } => identification.clone(),
            EventPayload::AccountCreated { account_number, .. }
            | EventPayload::AccountUpdated { account_number, .. }
            | EventPayload::AccountDeleted { account_number, .. }
            | EventPayload::MovementCreated { account_number, .. } => account_number.to_string(),
        }
    }
}

// ── Record headers ───────────────────────────────────────────────────────────

/// Headers stamped onto every published record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHeaders {
    #[serde(rename = "event-id")]
    pub event_id: EventId,
    #[serde(rename = "event-type")]
    pub event_type: String,
    /// Unix epoch milliseconds.
    #[serde(rename = "event-timestamp")]
    pub event_timestamp: i64,
    /// Name of the producing service.
    pub source: String,
    #[serde(rename = "x-correlation-id")]
    pub correlation_id: Uuid,
    #[serde(rename = "content-type")]
    pub content_type: String,
    #[serde(rename = "schema-version")]
    pub schema_version: u32,
    #[serde(rename = "entity-id")]
    pub entity_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_discriminator_is_domain_verb() {
        let payload = EventPayload::CustomerDeleted {
            customer_id: CustomerId::new(),
            identification: "17".into(),
        };
        let event = DomainEvent::new(Uuid::new_v4(), payload);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "customer.deleted");
        assert!(json["eventId"].is_string());
        assert!(json["correlationId"].is_string());
    }

    #[test]
    fn customer_events_partition_by_identification() {
        let a = EventPayload::CustomerCreated {
            customer_id: CustomerId::new(),
            identification: "998877".into(),
            name: "Jose Lema".into(),
            active: true,
        };
        let b = EventPayload::CustomerDeleted {
            customer_id: CustomerId::new(),
            identification: "998877".into(),
        };
        assert_eq!(a.partition_key(), b.partition_key());
    }

    #[test]
    fn movement_events_partition_by_account() {
        let p = EventPayload::MovementCreated {
            movement_id: MovementId::new(),
            account_number: 478758,
            movement_type: MovementType::Credit,
            amount: Money::from(600),
            balance_after: Money::from(2000),
            transaction_id: "TXN-A".into(),
        };
        assert_eq!(p.partition_key(), "478758");
        assert_eq!(p.entity_id(), "478758");
    }
}
