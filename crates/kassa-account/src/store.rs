use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kassa_bus::{BusError, OffsetStore};
use kassa_core::account::{Account, AccountType};
use kassa_core::constants::{overdraft_floor, ACCOUNT_NUMBER_SEED};
use kassa_core::error::KassaError;
use kassa_core::movement::{Movement, MovementType};
use kassa_core::types::{AccountNumber, CustomerId, Money, MovementId, Timestamp};

/// Persistent account database backed by sled.
///
/// Named trees:
///   accounts             — u64 be bytes                      → bincode(Account)
///   movements            — MovementId bytes                  → bincode(Movement)
///   movements_by_account — account be ++ millis be ++ id     → [] (ordered index)
///   tx_index             — transaction_id utf8               → MovementId bytes (unique)
///   idem_index           — idempotency_key utf8              → MovementId bytes (unique)
///   meta                 — utf8 key                          → raw bytes (sequence, bus offsets)
///
/// [`AccountStore::append_movement`] is the equivalent of the relational
/// posting trigger: it re-checks the overdraft floor, computes the balance
/// columns, flips the original's `reversed` flag and updates the account
/// balance. Callers serialize per account; uniqueness claims go through
/// `compare_and_swap`, so the store stays the source of truth when
/// prechecks race.
pub struct AccountStore {
    _db: sled::Db,
    accounts: sled::Tree,
    movements: sled::Tree,
    movements_by_account: sled::Tree,
    tx_index: sled::Tree,
    idem_index: sled::Tree,
    meta: sled::Tree,
}

/// Input to [`AccountStore::append_movement`]. Balance columns are computed
/// by the store, never by the caller.
#[derive(Debug, Clone)]
pub struct MovementDraft {
    pub movement_id: MovementId,
    pub account_number: AccountNumber,
    pub movement_type: MovementType,
    pub amount: Money,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub transaction_id: String,
    pub idempotency_key: Option<String>,
    /// The full original row when `movement_type` is REVERSAL.
    pub reversal_of: Option<Movement>,
    pub created_at: Timestamp,
    pub request_id: Uuid,
    pub correlation_id: Uuid,
}

fn storage(e: sled::Error) -> KassaError {
    KassaError::Storage(e.to_string())
}

fn codec(e: bincode::Error) -> KassaError {
    KassaError::Serialization(e.to_string())
}

fn u64_from(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    if bytes.len() == 8 {
        raw.copy_from_slice(bytes);
    }
    u64::from_be_bytes(raw)
}

fn movement_id_from(bytes: &[u8]) -> MovementId {
    let mut raw = [0u8; 16];
    if bytes.len() == 16 {
        raw.copy_from_slice(bytes);
    }
    MovementId::from_bytes(raw)
}

/// Index key: account (8) ++ created-at millis (8) ++ movement id (16).
/// sled iterates keys ascending, which gives per-account chronological order.
fn index_key(account: AccountNumber, created_at: &Timestamp, id: &MovementId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&account.to_be_bytes());
    key[8..16].copy_from_slice(&(created_at.timestamp_millis() as u64).to_be_bytes());
    key[16..].copy_from_slice(id.as_bytes());
    key
}

impl AccountStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KassaError> {
        Self::from_db(sled::open(path).map_err(storage)?)
    }

    /// In-memory store wiped on drop. Test harness helper.
    pub fn temporary() -> Result<Self, KassaError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, KassaError> {
        let accounts = db.open_tree("accounts").map_err(storage)?;
        let movements = db.open_tree("movements").map_err(storage)?;
        let movements_by_account = db.open_tree("movements_by_account").map_err(storage)?;
        let tx_index = db.open_tree("tx_index").map_err(storage)?;
        let idem_index = db.open_tree("idem_index").map_err(storage)?;
        let meta = db.open_tree("meta").map_err(storage)?;
        Ok(Self {
            _db: db,
            accounts,
            movements,
            movements_by_account,
            tx_index,
            idem_index,
            meta,
        })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    /// Allocate the next account number. Strictly monotone, never reused.
    pub fn next_account_number(&self) -> Result<AccountNumber, KassaError> {
        let bytes = self
            .meta
            .update_and_fetch("account_seq", |old| {
                let next = match old {
                    Some(b) => u64_from(b) + 1,
                    None => ACCOUNT_NUMBER_SEED,
                };
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(storage)?
            .unwrap_or_default();
        Ok(u64_from(&bytes))
    }

    pub fn get_account(&self, number: AccountNumber) -> Result<Option<Account>, KassaError> {
        match self.accounts.get(number.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec)?)),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, account: &Account) -> Result<(), KassaError> {
        let bytes = bincode::serialize(account).map_err(codec)?;
        self.accounts
            .insert(account.account_number.to_be_bytes(), bytes)
            .map_err(storage)?;
        Ok(())
    }

    /// Replace `current` with `updated` iff the stored row is unchanged.
    pub fn update_account_versioned(
        &self,
        current: &Account,
        updated: &Account,
    ) -> Result<(), KassaError> {
        let old = bincode::serialize(current).map_err(codec)?;
        let new = bincode::serialize(updated).map_err(codec)?;
        let swapped = self
            .accounts
            .compare_and_swap(current.account_number.to_be_bytes(), Some(old), Some(new))
            .map_err(storage)?;
        if swapped.is_err() {
            let actual = self
                .get_account(current.account_number)?
                .map(|a| a.version)
                .unwrap_or(0);
            return Err(KassaError::VersionConflict {
                expected: current.version,
                actual,
            });
        }
        Ok(())
    }

    /// All accounts owned by `customer_id`, ordered by account number.
    pub fn accounts_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, KassaError> {
        let mut result = Vec::new();
        for item in self.accounts.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let account: Account = bincode::deserialize(&bytes).map_err(codec)?;
            if account.customer_id == customer_id {
                result.push(account);
            }
        }
        Ok(result)
    }

    pub fn list_accounts(
        &self,
        customer_id: Option<CustomerId>,
        account_type: Option<AccountType>,
        active: Option<bool>,
        page: usize,
        size: usize,
    ) -> Result<(Vec<Account>, usize), KassaError> {
        let mut all = Vec::new();
        for item in self.accounts.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let account: Account = bincode::deserialize(&bytes).map_err(codec)?;
            if customer_id.map_or(true, |c| c == account.customer_id)
                && account_type.map_or(true, |t| t == account.account_type)
                && active.map_or(true, |a| a == account.active)
            {
                all.push(account);
            }
        }
        let total = all.len();
        let start = page.saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        Ok((all[start..end].to_vec(), total))
    }

    // ── Movements ────────────────────────────────────────────────────────────

    pub fn get_movement(&self, id: MovementId) -> Result<Option<Movement>, KassaError> {
        match self.movements.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec)?)),
            None => Ok(None),
        }
    }

    pub fn movement_id_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<MovementId>, KassaError> {
        Ok(self
            .tx_index
            .get(transaction_id.as_bytes())
            .map_err(storage)?
            .map(|b| movement_id_from(&b)))
    }

    pub fn movement_id_for_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<MovementId>, KassaError> {
        Ok(self
            .idem_index
            .get(key.as_bytes())
            .map_err(storage)?
            .map(|b| movement_id_from(&b)))
    }

    /// Movements of one account ordered by creation time, optionally limited
    /// to an inclusive `[from, to]` window.
    pub fn movements_for_account(
        &self,
        account: AccountNumber,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Movement>, KassaError> {
        let (lo, hi) = match window {
            Some((from, to)) => {
                // Clamp pre-epoch instants to zero: index keys store millis
                // as unsigned.
                let from_millis = from.timestamp_millis().max(0) as u64;
                let to_millis = to.timestamp_millis().max(0) as u64;
                let mut lo = [0u8; 16];
                lo[..8].copy_from_slice(&account.to_be_bytes());
                lo[8..].copy_from_slice(&from_millis.to_be_bytes());
                let mut hi = [0xffu8; 32];
                hi[..8].copy_from_slice(&account.to_be_bytes());
                hi[8..16].copy_from_slice(&to_millis.to_be_bytes());
                (lo.to_vec(), hi.to_vec())
            }
            None => {
                let lo = account.to_be_bytes().to_vec();
                let hi = {
                    let mut hi = [0xffu8; 32];
                    hi[..8].copy_from_slice(&account.to_be_bytes());
                    hi.to_vec()
                };
                (lo, hi)
            }
        };

        let mut result = Vec::new();
        for item in self.movements_by_account.range(lo..=hi) {
            let (key, _) = item.map_err(storage)?;
            let id = movement_id_from(&key[16..]);
            if let Some(movement) = self.get_movement(id)? {
                result.push(movement);
            }
        }
        Ok(result)
    }

    /// The posting critical section, equivalent to the relational trigger.
    ///
    /// Re-reads the account row, enforces active state and the overdraft
    /// floor, claims the uniqueness indexes, computes `balance_before` /
    /// `balance_after`, writes the movement plus its index entry, flips the
    /// original on a reversal and updates the account balance and version.
    /// Callers must hold the per-account lock so no other post interleaves.
    pub fn append_movement(&self, draft: MovementDraft) -> Result<(Movement, Account), KassaError> {
        let mut account = self
            .get_account(draft.account_number)?
            .ok_or(KassaError::AccountNotFound(draft.account_number))?;
        if !account.active {
            return Err(KassaError::AccountNotActive(draft.account_number));
        }
        if draft.amount <= Money::ZERO {
            return Err(KassaError::InvalidAmount);
        }

        let signed = match draft.movement_type {
            MovementType::Credit => draft.amount,
            MovementType::Debit => -draft.amount,
            MovementType::Reversal => {
                let original = draft
                    .reversal_of
                    .as_ref()
                    .ok_or_else(|| KassaError::InvalidReversal("original movement missing".into()))?;
                -original.signed_effect()
            }
        };

        let balance_before = account.current_balance;
        let balance_after = balance_before + signed;
        if draft.movement_type == MovementType::Debit && balance_after < overdraft_floor() {
            return Err(KassaError::InsufficientBalance {
                current: balance_before,
                requested: draft.amount,
                floor: overdraft_floor(),
            });
        }

        // Claim the uniqueness indexes before any row is written. The CAS
        // decides races the in-memory prechecks missed.
        if let Some(key) = &draft.idempotency_key {
            let claimed = self
                .idem_index
                .compare_and_swap(
                    key.as_bytes(),
                    None as Option<&[u8]>,
                    Some(&draft.movement_id.as_bytes()[..]),
                )
                .map_err(storage)?;
            if let Err(conflict) = claimed {
                let existing = conflict.current.map(|b| movement_id_from(&b));
                return Err(KassaError::DuplicateIdempotencyKey {
                    key: key.clone(),
                    movement_id: existing.unwrap_or(draft.movement_id),
                });
            }
        }
        let claimed = self
            .tx_index
            .compare_and_swap(
                draft.transaction_id.as_bytes(),
                None as Option<&[u8]>,
                Some(&draft.movement_id.as_bytes()[..]),
            )
            .map_err(storage)?;
        if claimed.is_err() {
            // Release the idempotency claim taken above.
            if let Some(key) = &draft.idempotency_key {
                self.idem_index.remove(key.as_bytes()).map_err(storage)?;
            }
            return Err(KassaError::DuplicateTransaction(draft.transaction_id));
        }

        let movement = Movement {
            movement_id: draft.movement_id,
            account_number: draft.account_number,
            movement_type: draft.movement_type,
            amount: draft.amount,
            balance_before,
            balance_after,
            description: draft.description,
            reference: draft.reference,
            transaction_id: draft.transaction_id,
            idempotency_key: draft.idempotency_key,
            reversed_movement_id: draft.reversal_of.as_ref().map(|m| m.movement_id),
            reversed: false,
            created_at: draft.created_at,
            request_id: draft.request_id,
            correlation_id: draft.correlation_id,
        };

        let bytes = bincode::serialize(&movement).map_err(codec)?;
        self.movements
            .insert(movement.movement_id.as_bytes(), bytes)
            .map_err(storage)?;
        self.movements_by_account
            .insert(
                index_key(
                    movement.account_number,
                    &movement.created_at,
                    &movement.movement_id,
                ),
                b"".as_ref(),
            )
            .map_err(storage)?;

        // Atomically with the reversal's insert (the caller's account lock
        // spans both writes), mark the original as reversed.
        if let Some(mut original) = draft.reversal_of {
            original.reversed = true;
            let bytes = bincode::serialize(&original).map_err(codec)?;
            self.movements
                .insert(original.movement_id.as_bytes(), bytes)
                .map_err(storage)?;
        }

        account.current_balance = balance_after;
        account.touch(draft.created_at);
        self.put_account(&account)?;

        Ok((movement, account))
    }

    /// Remove an account and its whole ledger, including the uniqueness
    /// index entries of the removed movements. Returns the number of
    /// movements removed. Removing an absent account succeeds silently.
    pub fn delete_account_cascade(&self, number: AccountNumber) -> Result<usize, KassaError> {
        let mut removed = 0;
        for movement in self.movements_for_account(number, None)? {
            self.movements
                .remove(movement.movement_id.as_bytes())
                .map_err(storage)?;
            self.movements_by_account
                .remove(index_key(
                    movement.account_number,
                    &movement.created_at,
                    &movement.movement_id,
                ))
                .map_err(storage)?;
            self.tx_index
                .remove(movement.transaction_id.as_bytes())
                .map_err(storage)?;
            if let Some(key) = &movement.idempotency_key {
                self.idem_index.remove(key.as_bytes()).map_err(storage)?;
            }
            removed += 1;
        }
        self.accounts
            .remove(number.to_be_bytes())
            .map_err(storage)?;
        Ok(removed)
    }
}

// ── Bus offsets ──────────────────────────────────────────────────────────────

/// Consumer-group offsets live in the service's own store so a restart
/// resumes exactly where the group left off.
impl OffsetStore for AccountStore {
    fn load(&self, topic: &str, group: &str, partition: u32) -> Result<u64, BusError> {
        let key = format!("offset/{topic}/{group}/{partition}");
        let value = self
            .meta
            .get(key.as_bytes())
            .map_err(|e| BusError::OffsetStore(e.to_string()))?;
        Ok(value.map(|b| u64_from(&b)).unwrap_or(0))
    }

    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Result<(), BusError> {
        let key = format!("offset/{topic}/{group}/{partition}");
        self.meta
            .insert(key.as_bytes(), offset.to_be_bytes().to_vec())
            .map_err(|e| BusError::OffsetStore(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rust_decimal::Decimal;

    fn seed_account(store: &AccountStore, balance: Money) -> Account {
        let number = store.next_account_number().unwrap();
        let account = Account::new(
            number,
            CustomerId::new(),
            "Jose Lema".into(),
            AccountType::Savings,
            balance,
            Utc::now(),
        );
        store.put_account(&account).unwrap();
        account
    }

    fn draft(account: &Account, movement_type: MovementType, amount: Money, tx: &str) -> MovementDraft {
        MovementDraft {
            movement_id: MovementId::new(),
            account_number: account.account_number,
            movement_type,
            amount,
            description: None,
            reference: None,
            transaction_id: tx.into(),
            idempotency_key: None,
            reversal_of: None,
            created_at: Utc::now(),
            request_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn account_numbers_are_monotone() {
        let store = AccountStore::temporary().unwrap();
        let first = store.next_account_number().unwrap();
        let second = store.next_account_number().unwrap();
        assert_eq!(first, ACCOUNT_NUMBER_SEED);
        assert!(second > first);
    }

    #[test]
    fn append_updates_balance_and_populates_columns() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(1400));

        let (movement, updated) = store
            .append_movement(draft(&account, MovementType::Credit, Money::from(600), "TXN-A"))
            .unwrap();
        assert_eq!(movement.balance_before, Money::from(1400));
        assert_eq!(movement.balance_after, Money::from(2000));
        assert_eq!(updated.current_balance, Money::from(2000));
        assert_eq!(updated.version, account.version + 1);
    }

    #[test]
    fn floor_is_enforced_inside_the_store() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(540));

        // 540 − 10540 = −10000: exactly on the floor, allowed.
        let (m, _) = store
            .append_movement(draft(&account, MovementType::Debit, Money::from(10_540), "TXN-EDGE"))
            .unwrap();
        assert_eq!(m.balance_after, Money::from(-10_000));

        // One cent below the floor is refused and writes nothing.
        let err = store
            .append_movement(draft(
                &seed_account(&store, Decimal::new(54_000, 2)),
                MovementType::Debit,
                Decimal::new(1_054_001, 2),
                "TXN-OVER",
            ))
            .unwrap_err();
        match err {
            KassaError::InsufficientBalance {
                current,
                requested,
                floor,
            } => {
                assert_eq!(current, Decimal::new(54_000, 2));
                assert_eq!(requested, Decimal::new(1_054_001, 2));
                assert_eq!(floor, Money::from(-10_000));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store
            .movement_id_for_transaction("TXN-OVER")
            .unwrap()
            .is_none());
    }

    #[test]
    fn transaction_id_claims_are_unique() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(100));

        store
            .append_movement(draft(&account, MovementType::Credit, Money::from(1), "TXN-DUP"))
            .unwrap();
        let err = store
            .append_movement(draft(&account, MovementType::Credit, Money::from(1), "TXN-DUP"))
            .unwrap_err();
        assert!(matches!(err, KassaError::DuplicateTransaction(_)));
    }

    #[test]
    fn idempotency_conflict_reports_existing_movement() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(100));

        let mut first = draft(&account, MovementType::Credit, Money::from(5), "TXN-1");
        first.idempotency_key = Some("KEY".into());
        let (stored, _) = store.append_movement(first).unwrap();

        let mut retry = draft(&account, MovementType::Credit, Money::from(5), "TXN-2");
        retry.idempotency_key = Some("KEY".into());
        match store.append_movement(retry).unwrap_err() {
            KassaError::DuplicateIdempotencyKey { key, movement_id } => {
                assert_eq!(key, "KEY");
                assert_eq!(movement_id, stored.movement_id);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The losing command left no trace.
        assert!(store
            .movement_id_for_transaction("TXN-2")
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_transaction_releases_the_idempotency_claim() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(100));

        store
            .append_movement(draft(&account, MovementType::Credit, Money::from(5), "TXN-X"))
            .unwrap();

        let mut losing = draft(&account, MovementType::Credit, Money::from(5), "TXN-X");
        losing.idempotency_key = Some("FRESH-KEY".into());
        assert!(matches!(
            store.append_movement(losing).unwrap_err(),
            KassaError::DuplicateTransaction(_)
        ));
        assert!(store
            .movement_id_for_idempotency_key("FRESH-KEY")
            .unwrap()
            .is_none());
    }

    #[test]
    fn reversal_flips_the_original() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(100));

        let (original, account_after) = store
            .append_movement(draft(&account, MovementType::Credit, Money::from(100), "TXN-B"))
            .unwrap();
        assert_eq!(account_after.current_balance, Money::from(200));

        let mut rev = draft(&account, MovementType::Reversal, Money::from(100), "REV-1");
        rev.reversal_of = Some(original.clone());
        let (reversal, account_final) = store.append_movement(rev).unwrap();

        assert_eq!(reversal.balance_after, Money::from(100));
        assert_eq!(reversal.reversed_movement_id, Some(original.movement_id));
        assert_eq!(account_final.current_balance, Money::from(100));
        assert!(store
            .get_movement(original.movement_id)
            .unwrap()
            .unwrap()
            .reversed);
    }

    #[test]
    fn cascade_delete_clears_ledger_and_indexes() {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(50));
        let mut d = draft(&account, MovementType::Credit, Money::from(5), "TXN-C");
        d.idempotency_key = Some("K-C".into());
        store.append_movement(d).unwrap();

        assert_eq!(store.delete_account_cascade(account.account_number).unwrap(), 1);
        assert!(store.get_account(account.account_number).unwrap().is_none());
        assert!(store.movement_id_for_transaction("TXN-C").unwrap().is_none());
        assert!(store.movement_id_for_idempotency_key("K-C").unwrap().is_none());

        // Deleting again is a silent no-op.
        assert_eq!(store.delete_account_cascade(account.account_number).unwrap(), 0);
    }

    #[test]
    fn offsets_round_trip() {
        let store = AccountStore::temporary().unwrap();
        assert_eq!(store.load("t", "g", 0).unwrap(), 0);
        store.commit("t", "g", 0, 42).unwrap();
        assert_eq!(store.load("t", "g", 0).unwrap(), 42);
        assert_eq!(store.load("t", "g", 1).unwrap(), 0);
    }

    // ── Property: the ledger and the balance never drift ─────────────────────

    #[quickcheck]
    fn balance_equals_initial_plus_signed_effects(ops: Vec<(bool, u32)>) -> bool {
        let store = AccountStore::temporary().unwrap();
        let account = seed_account(&store, Money::from(500));

        for (i, (credit, cents)) in ops.iter().enumerate() {
            let amount = Decimal::new(i64::from(*cents) + 1, 2);
            let movement_type = if *credit {
                MovementType::Credit
            } else {
                MovementType::Debit
            };
            // Refused debits must leave no trace; accepted ones must post.
            let _ = store.append_movement(draft(
                &account,
                movement_type,
                amount,
                &format!("TXN-{i}"),
            ));
        }

        let movements = store
            .movements_for_account(account.account_number, None)
            .unwrap();
        let effect: Money = movements.iter().map(|m| m.signed_effect()).sum();
        let stored = store.get_account(account.account_number).unwrap().unwrap();

        stored.current_balance == account.initial_balance + effect
            && movements
                .iter()
                .all(|m| m.balance_after - m.balance_before == m.signed_effect())
            && movements.iter().all(|m| m.balance_after >= overdraft_floor())
    }
}
