use std::path::Path;

use kassa_core::customer::Customer;
use kassa_core::error::KassaError;
use kassa_core::types::CustomerId;

/// Persistent customer database backed by sled.
///
/// Named trees:
///   customers   — CustomerId bytes      → bincode(Customer)
///   ident_index — identification utf8   → CustomerId bytes (unique)
///
/// Uniqueness of the national identification and optimistic concurrency on
/// updates are both enforced with `compare_and_swap`, so racing writers are
/// decided by the store rather than by in-memory prechecks.
pub struct CustomerStore {
    _db: sled::Db,
    customers: sled::Tree,
    ident_index: sled::Tree,
}

fn storage(e: sled::Error) -> KassaError {
    KassaError::Storage(e.to_string())
}

fn codec(e: bincode::Error) -> KassaError {
    KassaError::Serialization(e.to_string())
}

impl CustomerStore {
    /// Open or create the store at `path`.
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
        let customers = db.open_tree("customers").map_err(storage)?;
        let ident_index = db.open_tree("ident_index").map_err(storage)?;
        Ok(Self {
            _db: db,
            customers,
            ident_index,
        })
    }

    pub fn get(&self, id: &CustomerId) -> Result<Option<Customer>, KassaError> {
        match self.customers.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_identification(&self, identification: &str) -> Result<Option<Customer>, KassaError> {
        match self
            .ident_index
            .get(identification.as_bytes())
            .map_err(storage)?
        {
            Some(id_bytes) => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&id_bytes);
                self.get(&CustomerId::from_bytes(raw))
            }
            None => Ok(None),
        }
    }

    /// Insert a fresh customer, claiming its identification. A concurrent
    /// claim of the same identification loses with `CUSTOMER_ALREADY_EXISTS`.
    pub fn insert_new(&self, customer: &Customer) -> Result<(), KassaError> {
        let claimed = self
            .ident_index
            .compare_and_swap(
                customer.person.identification.as_bytes(),
                None as Option<&[u8]>,
                Some(&customer.customer_id.as_bytes()[..]),
            )
            .map_err(storage)?;
        if claimed.is_err() {
            return Err(KassaError::CustomerAlreadyExists(
                customer.person.identification.clone(),
            ));
        }

        let bytes = bincode::serialize(customer).map_err(codec)?;
        self.customers
            .insert(customer.customer_id.as_bytes(), bytes)
            .map_err(storage)?;
        Ok(())
    }

    /// Replace `current` with `updated` iff the stored row still equals
    /// `current`. A lost race surfaces as `VERSION_CONFLICT` carrying the
    /// version actually found.
    pub fn update_versioned(
        &self,
        current: &Customer,
        updated: &Customer,
    ) -> Result<(), KassaError> {
        let old = bincode::serialize(current).map_err(codec)?;
        let new = bincode::serialize(updated).map_err(codec)?;
        let swapped = self
            .customers
            .compare_and_swap(current.customer_id.as_bytes(), Some(old), Some(new))
            .map_err(storage)?;
        if swapped.is_err() {
            let actual = self
                .get(&current.customer_id)?
                .map(|c| c.version)
                .unwrap_or(0);
            return Err(KassaError::VersionConflict {
                expected: current.version,
                actual,
            });
        }
        Ok(())
    }

    pub fn remove(&self, customer: &Customer) -> Result<(), KassaError> {
        self.customers
            .remove(customer.customer_id.as_bytes())
            .map_err(storage)?;
        self.ident_index
            .remove(customer.person.identification.as_bytes())
            .map_err(storage)?;
        Ok(())
    }

    /// All customers matching `active`, ordered by creation time, paged.
    /// Returns the page and the total match count.
    pub fn list(
        &self,
        active: Option<bool>,
        page: usize,
        size: usize,
    ) -> Result<(Vec<Customer>, usize), KassaError> {
        let mut all = Vec::new();
        for item in self.customers.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let customer: Customer = bincode::deserialize(&bytes).map_err(codec)?;
            if active.map_or(true, |want| want == customer.active) {
                all.push(customer);
            }
        }
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        let total = all.len();
        let start = page.saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        Ok((all[start..end].to_vec(), total))
    }
}
