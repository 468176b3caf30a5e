use std::sync::Arc;

use tracing::{debug, info};

use kassa_bus::ConsumedEvent;
use kassa_core::account::AccountType;
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::event::EventPayload;
use kassa_core::types::Money;

use crate::lifecycle::AccountLifecycle;

/// Handlers for the Customer service's events. Delivery is at-least-once,
/// so every branch is idempotent: provisioning an already-provisioned
/// customer is a no-op, deleting already-deleted accounts succeeds silently.
pub struct CustomerEventHandler {
    lifecycle: Arc<AccountLifecycle>,
}

impl CustomerEventHandler {
    pub fn new(lifecycle: Arc<AccountLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn handle(&self, consumed: ConsumedEvent) -> Result<(), KassaError> {
        let ctx = RequestContext::from_event(consumed.event.correlation_id);
        match consumed.event.payload {
            EventPayload::CustomerCreated {
                customer_id, name, ..
            } => {
                match self
                    .lifecycle
                    .create_unchecked(&ctx, customer_id, name, AccountType::Savings, Money::ZERO)
                    .await
                {
                    Ok(account) => {
                        info!(
                            customer_id = %customer_id,
                            account = account.account_number,
                            "provisioned default savings account"
                        );
                        Ok(())
                    }
                    // Redelivery: the default account already exists.
                    Err(KassaError::BusinessRule(reason)) => {
                        debug!(customer_id = %customer_id, reason, "default account already provisioned");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            // Audit only.
            EventPayload::CustomerUpdated {
                customer_id,
                active,
                ..
            } => {
                info!(customer_id = %customer_id, active, "customer updated");
                Ok(())
            }

            EventPayload::CustomerDeleted { customer_id, .. } => {
                let removed = self.lifecycle.delete_for_customer(&ctx, customer_id).await?;
                info!(customer_id = %customer_id, removed, "handled customer deletion");
                Ok(())
            }

            // This consumer only subscribes to the customer topic; anything
            // else is noise to skip.
            other => {
                debug!(event_type = other.event_type(), "ignoring event");
                Ok(())
            }
        }
    }
}
