use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use kassa_bus::EventPublisher;
use kassa_core::context::RequestContext;
use kassa_core::customer::{Customer, Person};
use kassa_core::error::KassaError;
use kassa_core::event::{DomainEvent, EventPayload, CUSTOMER_EVENTS_TOPIC};
use kassa_core::types::{CustomerId, Version};

use crate::store::CustomerStore;

pub struct CreateCustomer {
    pub person: Person,
    pub password: String,
}

/// Generic update. `identification` and `active` are immutable through this
/// path: identity never changes, and state changes go through `set_state`.
#[derive(Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// When present, the mutation fails with `VERSION_CONFLICT` unless the
    /// stored row still carries this version.
    pub expected_version: Option<Version>,
}

#[derive(Debug, Default, Clone)]
pub struct CustomerListFilter {
    pub active: Option<bool>,
    pub page: usize,
    pub size: usize,
}

/// Customer lifecycle engine. Every mutation bumps the version through a
/// store-level compare-and-swap and publishes the matching domain event
/// fire-and-forget.
pub struct CustomerService {
    store: Arc<CustomerStore>,
    publisher: EventPublisher,
}

impl CustomerService {
    pub fn new(store: Arc<CustomerStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        cmd: CreateCustomer,
    ) -> Result<Customer, KassaError> {
        if cmd.person.name.trim().is_empty() {
            return Err(KassaError::Validation("name must not be blank".into()));
        }
        if cmd.person.identification.trim().is_empty() {
            return Err(KassaError::Validation(
                "identification must not be blank".into(),
            ));
        }
        if cmd.password.is_empty() {
            return Err(KassaError::Validation("password must not be blank".into()));
        }

        let password_hash = kassa_auth::hash_password(&cmd.password);
        let customer = Customer::new(cmd.person, password_hash, Utc::now());
        self.store.insert_new(&customer)?;

        info!(customer_id = %customer.customer_id, "customer created");
        self.publisher.publish(
            CUSTOMER_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::CustomerCreated {
                    customer_id: customer.customer_id,
                    identification: customer.person.identification.clone(),
                    name: customer.person.name.clone(),
                    active: customer.active,
                },
            ),
        );
        Ok(customer)
    }

    pub async fn get(&self, id: CustomerId) -> Result<Customer, KassaError> {
        self.store
            .get(&id)?
            .ok_or(KassaError::CustomerNotFound(id))
    }

    pub async fn list(
        &self,
        filter: CustomerListFilter,
    ) -> Result<(Vec<Customer>, usize), KassaError> {
        let size = if filter.size == 0 { 20 } else { filter.size };
        self.store.list(filter.active, filter.page, size)
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
        cmd: UpdateCustomer,
    ) -> Result<Customer, KassaError> {
        let current = self.get(id).await?;
        if let Some(expected) = cmd.expected_version {
            if expected != current.version {
                return Err(KassaError::VersionConflict {
                    expected,
                    actual: current.version,
                });
            }
        }

        let mut updated = current.clone();
        if let Some(name) = cmd.name {
            if name.trim().is_empty() {
                return Err(KassaError::Validation("name must not be blank".into()));
            }
            updated.person.name = name;
        }
        if let Some(gender) = cmd.gender {
            updated.person.gender = Some(gender);
        }
        if let Some(age) = cmd.age {
            updated.person.age = Some(age);
        }
        if let Some(address) = cmd.address {
            updated.person.address = Some(address);
        }
        if let Some(phone) = cmd.phone {
            updated.person.phone = Some(phone);
        }
        if let Some(email) = cmd.email {
            updated.person.email = Some(email);
        }
        updated.touch(Utc::now());

        self.store.update_versioned(&current, &updated)?;
        self.publish_updated(ctx, &updated);
        Ok(updated)
    }

    /// Dedicated state toggle; the only path that mutates `active`.
    pub async fn set_state(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
        active: bool,
    ) -> Result<Customer, KassaError> {
        let current = self.get(id).await?;
        let mut updated = current.clone();
        updated.active = active;
        updated.touch(Utc::now());

        self.store.update_versioned(&current, &updated)?;
        info!(customer_id = %id, active, "customer state changed");
        self.publish_updated(ctx, &updated);
        Ok(updated)
    }

    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        id: CustomerId,
        new_password: &str,
    ) -> Result<Customer, KassaError> {
        if new_password.is_empty() {
            return Err(KassaError::Validation("password must not be blank".into()));
        }
        let current = self.get(id).await?;
        let mut updated = current.clone();
        updated.password_hash = kassa_auth::hash_password(new_password);
        updated.touch(Utc::now());

        self.store.update_versioned(&current, &updated)?;
        self.publish_updated(ctx, &updated);
        Ok(updated)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: CustomerId) -> Result<(), KassaError> {
        let customer = self.get(id).await?;
        self.store.remove(&customer)?;

        info!(customer_id = %id, "customer deleted");
        self.publisher.publish(
            CUSTOMER_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::CustomerDeleted {
                    customer_id: customer.customer_id,
                    identification: customer.person.identification.clone(),
                },
            ),
        );
        Ok(())
    }

    /// Peer-facing existence/activity check: Ok only for an active customer.
    pub async fn validate(&self, id: CustomerId) -> Result<Customer, KassaError> {
        let customer = self.get(id).await?;
        if !customer.active {
            return Err(KassaError::CustomerNotActive(id));
        }
        Ok(customer)
    }

    fn publish_updated(&self, ctx: &RequestContext, customer: &Customer) {
        self.publisher.publish(
            CUSTOMER_EVENTS_TOPIC,
            DomainEvent::new(
                ctx.correlation_id,
                EventPayload::CustomerUpdated {
                    customer_id: customer.customer_id,
                    identification: customer.person.identification.clone(),
                    name: customer.person.name.clone(),
                    active: customer.active,
                },
            ),
        );
    }
}
