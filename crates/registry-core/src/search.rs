//! Name search over active records.
//!
//! Both sides are canonicalized, so harakat, letter variants and spacing in
//! the query do not affect what matches.

use crate::canon::canonicalize;
use crate::record::StudentRecord;
use crate::workflow::Registry;

/// Active records whose canonical full name contains `query`, in store order,
/// at most `limit` of them. An empty query matches every active record.
pub fn filter_by_name<'a, I>(records: I, query: &str, limit: usize) -> Vec<StudentRecord>
where
    I: IntoIterator<Item = &'a StudentRecord>,
{
    let needle = canonicalize(query);
    records
        .into_iter()
        .filter(|r| !r.archived)
        .filter(|r| needle.is_empty() || r.canonical_name().contains(&needle))
        .take(limit)
        .cloned()
        .collect()
}

impl Registry {
    /// Search active records by full name, capped at `search.limit`.
    pub fn search(&self, query: &str) -> Vec<StudentRecord> {
        let state = self.store().snapshot();
        let hits = filter_by_name(&state.students, query, self.config().search.limit);
        tracing::debug!(query, hits = hits.len(), "search");
        hits
    }
}
