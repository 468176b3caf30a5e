//! Shared helpers for this crate's tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use kassa_client::CustomerSummary;
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;

use crate::directory::CustomerDirectory;

/// Directory stub: a fixed map of known customers.
pub(crate) struct StubDirectory {
    customers: Mutex<HashMap<CustomerId, CustomerSummary>>,
}

impl StubDirectory {
    pub(crate) fn new() -> Self {
        Self {
            customers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, id: CustomerId, name: &str, active: bool) {
        self.customers.lock().unwrap().insert(
            id,
            CustomerSummary {
                customer_id: id,
                name: name.into(),
                identification: format!("ident-{id}"),
                active,
            },
        );
    }
}

#[async_trait]
impl CustomerDirectory for StubDirectory {
    async fn validate_customer(
        &self,
        _ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<CustomerSummary, KassaError> {
        let customers = self.customers.lock().unwrap();
        let customer = customers
            .get(&customer_id)
            .ok_or(KassaError::CustomerNotFound(customer_id))?;
        if !customer.active {
            return Err(KassaError::CustomerNotActive(customer_id));
        }
        Ok(customer.clone())
    }
}
