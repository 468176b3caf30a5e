//! kassa-http
//!
//! HTTP layer shared by the two daemons: axum routers over the domain
//! services, the auth & tracing middleware, and one exhaustive mapping from
//! typed domain errors to the canonical error body.

pub mod account;
pub mod customer;
pub mod error;
pub mod middleware;
pub mod types;

pub use account::{account_router, AccountApiState};
pub use customer::{customer_router, CustomerApiState};
pub use error::{ApiError, ErrorBody, FieldError};
pub use middleware::AuthState;
