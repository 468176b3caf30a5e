//! Ledger entries. Append-only: a movement row is never updated or deleted,
//! except that posting a REVERSAL flips the original's `reversed` flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::{AccountNumber, Money, MovementId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Credit,
    Debit,
    Reversal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Credit => "CREDIT",
            MovementType::Debit => "DEBIT",
            MovementType::Reversal => "REVERSAL",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREDIT" => Ok(MovementType::Credit),
            "DEBIT" => Ok(MovementType::Debit),
            "REVERSAL" => Ok(MovementType::Reversal),
            other => Err(format!("unknown movement type: {other}")),
        }
    }
}

/// One ledger entry applied to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub movement_id: MovementId,
    pub account_number: AccountNumber,
    pub movement_type: MovementType,
    /// Always positive; the direction comes from `movement_type`.
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Globally unique among all movements.
    pub transaction_id: String,
    /// Globally unique when present; de-duplicates client retries.
    pub idempotency_key: Option<String>,
    /// Set only when `movement_type` is REVERSAL; references a movement on
    /// the same account.
    pub reversed_movement_id: Option<MovementId>,
    /// Set to true on the *original* movement once a reversal against it is
    /// posted.
    pub reversed: bool,
    pub created_at: Timestamp,
    pub request_id: Uuid,
    pub correlation_id: Uuid,
}

impl Movement {
    /// The delta this row applied to its account's balance. Holds for all
    /// three movement types by the posting invariant
    /// `balance_after − balance_before == signed_effect`.
    pub fn signed_effect(&self) -> Money {
        self.balance_after - self.balance_before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_effect_is_the_balance_delta() {
        let movement = Movement {
            movement_id: MovementId::new(),
            account_number: 478758,
            movement_type: MovementType::Debit,
            amount: Money::from(25),
            balance_before: Money::from(100),
            balance_after: Money::from(75),
            description: None,
            reference: None,
            transaction_id: "TXN-1".into(),
            idempotency_key: None,
            reversed_movement_id: None,
            reversed: false,
            created_at: chrono::Utc::now(),
            request_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
        };
        assert_eq!(movement.signed_effect(), Money::from(-25));
    }

    #[test]
    fn movement_type_round_trips_through_str() {
        for t in [
            MovementType::Credit,
            MovementType::Debit,
            MovementType::Reversal,
        ] {
            assert_eq!(t.as_str().parse::<MovementType>().unwrap(), t);
        }
        assert!("TRANSFER".parse::<MovementType>().is_err());
    }
}
