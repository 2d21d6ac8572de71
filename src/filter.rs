//! Category, kind and free-text filtering over records.
//!
//! Pure functions: no state, no side effects, input order preserved.

use crate::types::{CategoryFilter, KindFilter, Record};

/// A combined category, kind and search filter.
///
/// A record passes when all three predicates pass. Search is a
/// case-insensitive substring match against title, body and address;
/// an empty search matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub category: CategoryFilter,
    pub kind: KindFilter,
    pub search: String,
}

impl RecordFilter {
    pub fn new(category: CategoryFilter, kind: KindFilter, search: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            search: search.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.matcher().matches(record)
    }

    /// Records that pass, in input order.
    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        let matcher = self.matcher();
        records.iter().filter(|r| matcher.matches(r)).collect()
    }

    fn matcher(&self) -> Matcher<'_> {
        Matcher {
            filter: self,
            needle: self.search.to_lowercase(),
        }
    }
}

/// A filter with its search text folded once.
struct Matcher<'a> {
    filter: &'a RecordFilter,
    needle: String,
}

impl Matcher<'_> {
    fn matches(&self, record: &Record) -> bool {
        self.filter.category.admits(&record.category)
            && self.filter.kind.admits(&record.kind)
            && self.matches_search(record)
    }

    fn matches_search(&self, record: &Record) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        contains_folded(&record.title, &self.needle)
            || contains_folded(&record.body, &self.needle)
            || record
                .address
                .as_deref()
                .is_some_and(|address| contains_folded(address, &self.needle))
    }
}

/// `needle` must already be lowercased.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Filter `records` by category, kind and search text, returning owned copies.
pub fn filter(
    records: &[Record],
    category: CategoryFilter,
    kind: KindFilter,
    search: &str,
) -> Vec<Record> {
    RecordFilter::new(category, kind, search)
        .apply(records)
        .into_iter()
        .cloned()
        .collect()
}
