//! In-memory document table shared by the bundled stores.

use super::{Direction, OrderBy, SortField};
use crate::error::{StoreError, StoreResult};
use crate::types::{Record, RecordId, RecordPatch};
use std::collections::HashMap;

struct Entry {
    /// Insertion position, used to break ordering ties.
    seq: u64,
    record: Record,
}

#[derive(Default)]
pub(crate) struct DocumentTable {
    docs: HashMap<RecordId, Entry>,
    next_seq: u64,
}

impl DocumentTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, id: &RecordId) -> bool {
        self.docs.contains_key(id)
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<&Record> {
        self.docs.get(id).map(|e| &e.record)
    }

    pub(crate) fn insert(&mut self, record: Record) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.docs.insert(record.id.clone(), Entry { seq, record });
    }

    pub(crate) fn update(&mut self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        let entry = self
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        patch.apply_to(&mut entry.record);
        Ok(())
    }

    /// Returns whether a document was removed.
    pub(crate) fn delete(&mut self, id: &RecordId) -> bool {
        self.docs.remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }

    pub(crate) fn list(&self, order: OrderBy) -> Vec<Record> {
        let mut entries: Vec<&Entry> = self.docs.values().collect();
        entries.sort_by(|a, b| {
            let by_field = match order.field {
                SortField::CreatedAt => a.record.created_at.cmp(&b.record.created_at),
                SortField::Title => a.record.title.cmp(&b.record.title),
            };
            let ord = by_field.then(a.seq.cmp(&b.seq));
            match order.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    /// Documents in the order they were first inserted.
    pub(crate) fn in_insertion_order(&self) -> Vec<Record> {
        let mut entries: Vec<&Entry> = self.docs.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Kind, Timestamp, UnitId};

    fn record(id: &str, title: &str, created_at: i64) -> Record {
        Record {
            id: RecordId::new(id),
            category: Category::Works,
            unit: UnitId::new("penha"),
            kind: Kind::Summary,
            title: title.into(),
            body: "b".into(),
            address: None,
            author: None,
            attachment_name: None,
            created_at: Timestamp(created_at),
        }
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_list_newest_first_breaks_ties_by_insertion() {
        let mut table = DocumentTable::new();
        table.insert(record("a", "x", 10));
        table.insert(record("b", "y", 30));
        table.insert(record("c", "z", 10));

        assert_eq!(ids(&table.list(OrderBy::newest_first())), vec!["b", "c", "a"]);

        let oldest_first = OrderBy {
            field: SortField::CreatedAt,
            direction: Direction::Ascending,
        };
        assert_eq!(ids(&table.list(oldest_first)), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_list_by_title() {
        let mut table = DocumentTable::new();
        table.insert(record("a", "beta", 1));
        table.insert(record("b", "alfa", 2));

        let order = OrderBy {
            field: SortField::Title,
            direction: Direction::Ascending,
        };
        assert_eq!(ids(&table.list(order)), vec!["b", "a"]);
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let mut table = DocumentTable::new();
        let result = table.update(&RecordId::new("missing"), &RecordPatch::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_reports_presence() {
        let mut table = DocumentTable::new();
        table.insert(record("a", "x", 1));
        assert!(table.delete(&RecordId::new("a")));
        assert!(!table.delete(&RecordId::new("a")));
        assert_eq!(table.len(), 0);
    }
}
