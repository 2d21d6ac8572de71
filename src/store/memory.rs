//! In-process document store.

use super::table::DocumentTable;
use super::{DocumentStore, OrderBy};
use crate::error::{StoreError, StoreResult};
use crate::types::{NewRecord, Record, RecordId, RecordPatch};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Document store held entirely in memory.
///
/// Supports fault injection: [`set_offline`](Self::set_offline) fails every
/// call as unreachable, [`fail_next_writes`](Self::fail_next_writes) rejects
/// a number of upcoming writes.
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<DocumentTable>,
    offline: AtomicBool,
    failing_writes: AtomicUsize,
    /// Writes the store accepted.
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `records`, inserted in iteration order.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        {
            let mut table = store.table.write();
            for record in records {
                table.insert(record);
            }
        }
        store
    }

    /// Make every subsequent call fail as unreachable (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of create, update and delete calls that succeeded.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a document directly, bypassing fault injection.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.table.read().get(id).cloned()
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        self.check_reachable()?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Rejected("injected write failure".into()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId> {
        self.check_write()?;
        let mut table = self.table.write();
        let mut id = RecordId::generate(payload.title.as_bytes());
        while table.contains(&id) {
            id = RecordId::generate(payload.title.as_bytes());
        }
        table.insert(Record::from_new(id.clone(), payload.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(%id, "memory store created document");
        Ok(id)
    }

    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>> {
        self.check_reachable()?;
        Ok(self.table.read().list(order))
    }

    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        self.check_write()?;
        self.table.write().update(id, patch)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        self.check_write()?;
        self.table.write().delete(id);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Kind, Timestamp, UnitId};

    fn payload(title: &str) -> NewRecord {
        NewRecord {
            category: Category::Pop,
            unit: UnitId::new("penha"),
            kind: Kind::Document,
            title: title.into(),
            body: "corpo".into(),
            address: None,
            author: None,
            attachment_name: None,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_create_and_list() {
        let store = MemoryStore::new();
        let id = store.create_record(&payload("one")).unwrap();
        let listed = store.list_records(OrderBy::newest_first()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_offline_fails_reads_and_writes() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.list_records(OrderBy::newest_first()),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.create_record(&payload("x")).is_err());

        store.set_offline(false);
        assert!(store.create_record(&payload("x")).is_ok());
    }

    #[test]
    fn test_fail_next_writes_counts_down() {
        let store = MemoryStore::new();
        store.fail_next_writes(2);
        assert!(matches!(
            store.create_record(&payload("a")),
            Err(StoreError::Rejected(_))
        ));
        assert!(store.create_record(&payload("b")).is_err());
        assert!(store.create_record(&payload("c")).is_ok());
        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_delete_unknown_succeeds() {
        let store = MemoryStore::new();
        store.delete_record(&RecordId::new("nope")).unwrap();
    }
}
