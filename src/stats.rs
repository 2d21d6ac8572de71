//! Summary counts over a record set.

use crate::types::{Kind, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Board statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    /// Number of records.
    pub total: usize,
    /// Distinct non-empty authors.
    pub unique_authors: usize,
    /// Distinct categories present.
    pub active_categories: usize,
    /// Records of kind [`Kind::RiskAlert`].
    pub risk_count: usize,
}

/// Aggregate whatever set the caller passes in.
pub fn aggregate<'a, I>(records: I) -> BoardStats
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut total = 0;
    let mut authors = HashSet::new();
    let mut categories = HashSet::new();
    let mut risk_count = 0;

    for record in records {
        total += 1;
        if let Some(author) = record.author.as_deref().filter(|a| !a.is_empty()) {
            authors.insert(author);
        }
        categories.insert(record.category);
        if record.kind == Kind::RiskAlert {
            risk_count += 1;
        }
    }

    BoardStats {
        total,
        unique_authors: authors.len(),
        active_categories: categories.len(),
        risk_count,
    }
}
