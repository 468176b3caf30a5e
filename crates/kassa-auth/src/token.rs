use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;

/// The single authority granted to every authenticated subject.
pub const ROLE_USER: &str = "ROLE_USER";

/// Subject claims carried in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Customer id of the subject.
    pub sub: String,
    /// National identification of the subject.
    pub identification: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn customer_id(&self) -> Result<CustomerId, KassaError> {
        self.sub
            .parse()
            .map_err(|_| KassaError::Unauthorized("malformed subject claim".into()))
    }
}

/// Issues and verifies HS256 bearer tokens with a shared secret.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            expiry: Duration::hours(expiry_hours),
        }
    }

    /// Mint a token for `customer_id`, expiring after the configured window.
    pub fn issue(
        &self,
        customer_id: &CustomerId,
        identification: &str,
    ) -> Result<String, KassaError> {
        let now = Utc::now();
        let claims = Claims {
            sub: customer_id.to_string(),
            identification: identification.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| KassaError::Internal(format!("signing token: {e}")))
    }

    /// Verify signature and expiry; returns the subject claims.
    pub fn verify(&self, token: &str) -> Result<Claims, KassaError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| KassaError::Unauthorized(format!("invalid token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let authority = TokenAuthority::new("kassa-test-secret", 1);
        let id = CustomerId::new();
        let token = authority.issue(&id, "1723456789").unwrap();
        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.customer_id().unwrap(), id);
        assert_eq!(claims.identification, "1723456789");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let issuer = TokenAuthority::new("secret-a", 1);
        let verifier = TokenAuthority::new("secret-b", 1);
        let token = issuer.issue(&CustomerId::new(), "x").unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(KassaError::Unauthorized(_))
        ));
    }

    #[test]
    fn verify_rejects_expired_token() {
        // Negative expiry puts `exp` in the past.
        let authority = TokenAuthority::new("secret", -1);
        let token = authority.issue(&CustomerId::new(), "x").unwrap();
        assert!(matches!(
            authority.verify(&token),
            Err(KassaError::Unauthorized(_))
        ));
    }

    #[test]
    fn verify_rejects_garbage() {
        let authority = TokenAuthority::new("secret", 1);
        assert!(authority.verify("not-a-token").is_err());
    }
}
