//! kassa-auth
//!
//! Bearer-token issue/verify (JWT HS256) and one-way password hashing.
//! Verification failures surface as `KassaError::Unauthorized`; the HTTP
//! middleware turns those into 401 responses.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenAuthority, ROLE_USER};
