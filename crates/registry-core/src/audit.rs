//! Append-only audit journal backed by redb.
//!
//! # Table design
//!
//! A single `ENTRIES` table keyed by a `u64` sequence number:
//! ```text
//! key:   seq (1, 2, 3, …) assigned inside the append transaction
//! value: JSON-encoded AuditEntry
//! ```
//!
//! redb serializes write transactions, so reading the last key and inserting
//! `last + 1` in the same transaction yields a gap-free total order. The
//! `at` timestamp is informational only. There is no update or delete path.

use crate::error::{RegistryError, Result};
use crate::types::{AuditAction, Caller, TrustLevel};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_entries");

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Assigned by the journal on append; 0 until then.
    #[serde(default)]
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub user: String,
    pub role: TrustLevel,
    pub action: AuditAction,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AuditEntry {
    pub fn new(caller: &Caller, action: AuditAction, payload: serde_json::Value) -> Self {
        Self {
            seq: 0,
            at: Utc::now(),
            user: caller.user.clone(),
            role: caller.trust,
            action,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// AuditJournal
// ---------------------------------------------------------------------------

pub struct AuditJournal {
    db: Database,
}

impl std::fmt::Debug for AuditJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditJournal").finish_non_exhaustive()
    }
}

impl AuditJournal {
    /// Open or create the journal at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(RegistryError::storage)?;
        // Ensure the table exists before any reads
        let wt = db.begin_write().map_err(RegistryError::storage)?;
        wt.open_table(ENTRIES).map_err(RegistryError::storage)?;
        wt.commit().map_err(RegistryError::storage)?;
        Ok(Self { db })
    }

    /// Append an entry and return its sequence number.
    pub fn append(&self, mut entry: AuditEntry) -> Result<u64> {
        let wt = self.db.begin_write().map_err(RegistryError::storage)?;
        let seq = {
            let mut table = wt.open_table(ENTRIES).map_err(RegistryError::storage)?;
            let last = table
                .last()
                .map_err(RegistryError::storage)?
                .map(|(k, _)| k.value())
                .unwrap_or(0);
            entry.seq = last + 1;
            let value = serde_json::to_vec(&entry)?;
            table
                .insert(entry.seq, value.as_slice())
                .map_err(RegistryError::storage)?;
            entry.seq
        };
        wt.commit().map_err(RegistryError::storage)?;
        Ok(seq)
    }

    /// The `n` most recent entries, newest first.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        let rt = self.db.begin_read().map_err(RegistryError::storage)?;
        let table = rt.open_table(ENTRIES).map_err(RegistryError::storage)?;

        let mut result = Vec::with_capacity(n.min(1024));
        for entry in table.iter().map_err(RegistryError::storage)?.rev().take(n) {
            let (_, v) = entry.map_err(RegistryError::storage)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    pub(crate) fn len(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(RegistryError::storage)?;
        let table = rt.open_table(ENTRIES).map_err(RegistryError::storage)?;
        table.len().map_err(RegistryError::storage)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, AuditJournal) {
        let dir = TempDir::new().unwrap();
        let journal = AuditJournal::open(&dir.path().join("audit.redb")).unwrap();
        (dir, journal)
    }

    fn entry(action: AuditAction, n: u32) -> AuditEntry {
        AuditEntry::new(&Caller::supervisor("sara"), action, json!({ "n": n }))
    }

    #[test]
    fn empty_journal() {
        let (_dir, journal) = open_tmp();
        assert_eq!(journal.len().unwrap(), 0);
        assert!(journal.tail(10).unwrap().is_empty());
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let (_dir, journal) = open_tmp();
        assert_eq!(journal.append(entry(AuditAction::CreateStudent, 1)).unwrap(), 1);
        assert_eq!(journal.append(entry(AuditAction::UpdateStudent, 2)).unwrap(), 2);
        assert_eq!(journal.len().unwrap(), 2);
    }

    #[test]
    fn tail_is_newest_first_and_capped() {
        let (_dir, journal) = open_tmp();
        for n in 1..=5 {
            journal.append(entry(AuditAction::CreateStudent, n)).unwrap();
        }
        let tail = journal.tail(3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].seq, 5);
        assert_eq!(tail[2].seq, 3);
        assert_eq!(tail[0].payload, json!({ "n": 5 }));
        assert_eq!(journal.tail(100).unwrap().len(), 5);
    }

    #[test]
    fn sequence_continues_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.redb");
        {
            let journal = AuditJournal::open(&path).unwrap();
            journal.append(entry(AuditAction::ArchiveStudent, 1)).unwrap();
        }
        let journal = AuditJournal::open(&path).unwrap();
        assert_eq!(journal.append(entry(AuditAction::Denied, 2)).unwrap(), 2);
        let tail = journal.tail(2).unwrap();
        assert_eq!(tail[0].action, AuditAction::Denied);
        assert_eq!(tail[1].action, AuditAction::ArchiveStudent);
        assert_eq!(tail[1].user, "sara");
        assert_eq!(tail[1].role, TrustLevel::Supervisor);
    }
}
