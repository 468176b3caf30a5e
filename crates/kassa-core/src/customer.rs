//! Customer entity owned by the Customer service.
//!
//! `Customer` embeds a [`Person`] value by composition; the two are stored
//! and versioned as one record.

use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, Timestamp, Version};

/// Identity and contact data of a natural person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Display name.
    pub name: String,
    /// National identifier. Globally unique, immutable after creation.
    pub identification: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A bank customer. Mutations go through the Customer service only; every
/// mutation bumps `version` and refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: CustomerId,
    pub person: Person,
    pub active: bool,
    /// One-way salted hash. The plaintext never leaves the request boundary.
    pub password_hash: String,
    pub version: Version,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Customer {
    pub fn new(person: Person, password_hash: String, now: Timestamp) -> Self {
        Self {
            customer_id: CustomerId::new(),
            person,
            active: true,
            password_hash,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the version counter and the update timestamp. Call exactly once
    /// per mutation, after the new field values are in place.
    pub fn touch(&mut self, now: Timestamp) {
        self.version += 1;
        self.updated_at = now;
    }
}
