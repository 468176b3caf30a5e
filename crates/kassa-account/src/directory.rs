use async_trait::async_trait;

use kassa_client::{CustomerClient, CustomerSummary};
use kassa_core::context::RequestContext;
use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;

/// Seam over the Customer service lookup used by account creation and the
/// statement engine. Production wires the resilient HTTP client; tests plug
/// in a stub.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Ok only for an existing, active customer.
    async fn validate_customer(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<CustomerSummary, KassaError>;
}

#[async_trait]
impl CustomerDirectory for CustomerClient {
    async fn validate_customer(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
    ) -> Result<CustomerSummary, KassaError> {
        CustomerClient::validate_customer(self, ctx, customer_id).await
    }
}
