//! The record store seam and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{B256, U256};

use crate::error::{IngestError, Result};
use crate::record::AnyRecord;

/// Durable home of records, written with create-or-replace semantics.
///
/// Implementations must make `upsert` idempotent: writing the same record
/// under the same id twice leaves the same observable state as writing it
/// once. Retrying a failed write is up to the caller.
pub trait RecordStore {
    /// Insert `record` under `id`, replacing any record already stored there.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StoreUnavailable`] if the write cannot be
    /// completed.
    fn upsert(&mut self, id: &str, record: AnyRecord) -> Result<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn upsert(&mut self, id: &str, record: AnyRecord) -> Result<()> {
        (**self).upsert(id, record)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn upsert(&mut self, id: &str, record: AnyRecord) -> Result<()> {
        (**self).upsert(id, record)
    }
}

/// Shared store: concurrent writers are serialized by the lock.
impl<S: RecordStore> RecordStore for Arc<Mutex<S>> {
    fn upsert(&mut self, id: &str, record: AnyRecord) -> Result<()> {
        self.lock()
            .map_err(|_| IngestError::store("record store lock poisoned"))?
            .upsert(id, record)
    }
}

/// Ordered in-memory store keyed by record id.
///
/// Used directly in tests and as the working set behind file-backed stores.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    records: BTreeMap<String, AnyRecord>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AnyRecord> {
        self.records.get(id)
    }

    /// All records, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &AnyRecord> {
        self.records.values()
    }

    /// Records emitted by one transaction, in log order.
    #[must_use]
    pub fn by_transaction(&self, transaction_hash: &B256) -> Vec<&AnyRecord> {
        let mut hits: Vec<_> = self
            .iter()
            .filter(|r| r.context().transaction_hash == *transaction_hash)
            .collect();
        hits.sort_by_key(|r| r.position());
        hits
    }

    /// Records from one block, in log order.
    #[must_use]
    pub fn by_block(&self, block_number: u64) -> Vec<&AnyRecord> {
        let mut hits: Vec<_> = self
            .iter()
            .filter(|r| r.context().block_number == block_number)
            .collect();
        hits.sort_by_key(|r| r.position());
        hits
    }

    /// Full history of one offer, in chain order.
    #[must_use]
    pub fn by_offer(&self, offer_id: U256) -> Vec<&AnyRecord> {
        let mut hits: Vec<_> = self.iter().filter(|r| r.offer_id() == offer_id).collect();
        hits.sort_by_key(|r| r.position());
        hits
    }
}

impl RecordStore for MemoryStore {
    fn upsert(&mut self, id: &str, record: AnyRecord) -> Result<()> {
        self.records.insert(id.to_owned(), record);
        Ok(())
    }
}

impl Extend<AnyRecord> for MemoryStore {
    fn extend<T: IntoIterator<Item = AnyRecord>>(&mut self, iter: T) {
        for record in iter {
            self.records.insert(record.id().to_owned(), record);
        }
    }
}
