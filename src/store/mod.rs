//! Document store collaborators.
//!
//! The repository only talks to a [`DocumentStore`]. Two implementations
//! ship with the crate:
//! - [`MemoryStore`]: in-process, with fault injection for exercising
//!   failure paths
//! - [`FileStore`]: durable, backed by an append-only operation log
//!
//! Hosted databases plug in by implementing the trait.

mod file;
mod memory;
mod oplog;
mod table;

pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;
pub use oplog::{LogEntry, LogOperation, OperationLog};

use crate::error::StoreResult;
use crate::types::{NewRecord, Record, RecordId, RecordPatch};
use std::sync::Arc;

/// Field a listing is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Title,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering requested from [`DocumentStore::list_records`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: SortField,
    pub direction: Direction,
}

impl OrderBy {
    /// Newest first.
    pub fn newest_first() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: Direction::Descending,
        }
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::newest_first()
    }
}

/// Remote persistence for records.
///
/// Every call may block on I/O.
pub trait DocumentStore: Send + Sync {
    /// Persist a new document and return the id the store assigned.
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId>;

    /// All documents, ordered. Ties keep insertion order (newer first when
    /// descending).
    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>>;

    /// Apply a partial update. Fails with `NotFound` for unknown ids.
    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()>;

    /// Delete by id. Unknown ids are not an error.
    fn delete_record(&self, id: &RecordId) -> StoreResult<()>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId> {
        (**self).create_record(payload)
    }

    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>> {
        (**self).list_records(order)
    }

    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        (**self).update_record(id, patch)
    }

    fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        (**self).delete_record(id)
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Box<T> {
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId> {
        (**self).create_record(payload)
    }

    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>> {
        (**self).list_records(order)
    }

    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        (**self).update_record(id, patch)
    }

    fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        (**self).delete_record(id)
    }
}
