//! Durable record store: committed students, the pending list, and the ledger
//! of applied offline operations, persisted together as one YAML document.
//!
//! All access goes through a single mutex. Writes run inside
//! [`RecordStore::transact`]: the closure mutates a working copy, the copy is
//! persisted atomically, and only then does it replace the in-memory state.
//! A closure error or a failed write leaves both disk and memory untouched.

use crate::catalog::Catalog;
use crate::error::{RegistryError, Result};
use crate::pending::{self, PendingChange, PendingOperation};
use crate::record::{StudentInput, StudentRecord};
use crate::types::Caller;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// AppliedOp
// ---------------------------------------------------------------------------

/// What a client operation id resolved to the first time it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
    pub applied_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StoreState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub pending: Vec<PendingOperation>,
    #[serde(default)]
    pub next_pending_seq: u64,
    #[serde(default)]
    pub applied_ops: BTreeMap<String, AppliedOp>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl StoreState {
    pub fn new() -> Self {
        Self {
            version: 1,
            students: Vec::new(),
            pending: Vec::new(),
            next_pending_seq: 0,
            applied_ops: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Committed records
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.students
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RegistryError::StudentNotFound(id.to_string()))
    }

    pub fn insert_record(&mut self, record: StudentRecord) -> Result<()> {
        if self.get(&record.id).is_some() {
            return Err(RegistryError::Validation(format!(
                "record id '{}' already exists",
                record.id
            )));
        }
        self.students.push(record);
        Ok(())
    }

    /// Merge `patch` onto the record and recompute its roll number.
    pub fn update_record(
        &mut self,
        id: &str,
        patch: &StudentInput,
        catalog: &Catalog,
    ) -> Result<StudentRecord> {
        let idx = self.position(id)?;
        let mut updated = self.students[idx].clone();
        updated.apply(patch)?;
        updated.finalize(catalog)?;
        self.students[idx] = updated.clone();
        Ok(updated)
    }

    /// Insert, or overwrite the record with the same id in place.
    pub fn upsert_record(&mut self, record: StudentRecord) {
        match self.students.iter_mut().find(|s| s.id == record.id) {
            Some(slot) => *slot = record,
            None => self.students.push(record),
        }
    }

    pub fn archive(&mut self, id: &str) -> Result<StudentRecord> {
        let idx = self.position(id)?;
        self.students[idx].archived = true;
        Ok(self.students[idx].clone())
    }

    pub fn find<P>(&self, predicate: P) -> Vec<StudentRecord>
    where
        P: Fn(&StudentRecord) -> bool,
    {
        self.students
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect()
    }

    pub fn list_active(&self) -> Vec<StudentRecord> {
        self.find(|s| !s.archived)
    }

    // -----------------------------------------------------------------------
    // Pending list
    // -----------------------------------------------------------------------

    pub fn push_pending(
        &mut self,
        change: PendingChange,
        caller: &Caller,
        op_id: Option<String>,
    ) -> PendingOperation {
        let item = PendingOperation {
            id: pending::next_id(&mut self.next_pending_seq),
            change,
            requested_by: caller.user.clone(),
            requested_role: caller.trust,
            requested_at: Utc::now(),
            op_id,
        };
        self.pending.push(item.clone());
        item
    }

    pub fn pending_item(&self, id: &str) -> Result<&PendingOperation> {
        self.pending
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| RegistryError::PendingNotFound(id.to_string()))
    }

    pub fn take_pending(&mut self, id: &str) -> Result<PendingOperation> {
        let idx = self
            .pending
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RegistryError::PendingNotFound(id.to_string()))?;
        Ok(self.pending.remove(idx))
    }

    // -----------------------------------------------------------------------
    // Applied offline operations
    // -----------------------------------------------------------------------

    pub fn applied_op(&self, op_id: &str) -> Option<&AppliedOp> {
        self.applied_ops.get(op_id)
    }

    pub fn record_applied_op(&mut self, op_id: &str, op: AppliedOp) {
        self.applied_ops.insert(op_id.to_string(), op);
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl RecordStore {
    /// Open an existing store under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let path = paths::store_path(root);
        if !path.exists() {
            return Err(RegistryError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: StoreState = if data.trim().is_empty() {
            StoreState::new()
        } else {
            serde_yaml::from_str(&data)?
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Write an empty store if none exists. Returns true if one was created.
    pub fn init(root: &Path) -> Result<bool> {
        let path = paths::store_path(root);
        if path.exists() {
            return Ok(false);
        }
        save(&path, &StoreState::new())?;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // State is only replaced after a successful write, so a poisoned
        // guard still holds a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the whole store.
    pub fn snapshot(&self) -> StoreState {
        self.lock().clone()
    }

    /// Run `f` against a working copy and commit it all-or-nothing.
    pub fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        let mut guard = self.lock();
        let mut working = guard.clone();
        let out = f(&mut working)?;
        working.last_updated = Utc::now();
        save(&self.path, &working)?;
        *guard = working;
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Convenience wrappers, one transaction each
    // -----------------------------------------------------------------------

    pub fn insert_record(&self, record: StudentRecord) -> Result<()> {
        self.transact(|s| s.insert_record(record))
    }

    pub fn update_record(
        &self,
        id: &str,
        patch: &StudentInput,
        catalog: &Catalog,
    ) -> Result<StudentRecord> {
        self.transact(|s| s.update_record(id, patch, catalog))
    }

    pub fn archive(&self, id: &str) -> Result<StudentRecord> {
        self.transact(|s| s.archive(id))
    }

    pub fn get(&self, id: &str) -> Option<StudentRecord> {
        self.lock().get(id).cloned()
    }

    pub fn find<P>(&self, predicate: P) -> Vec<StudentRecord>
    where
        P: Fn(&StudentRecord) -> bool,
    {
        self.lock().find(predicate)
    }

    pub fn list_active(&self) -> Vec<StudentRecord> {
        self.lock().list_active()
    }

    pub fn pending(&self) -> Vec<PendingOperation> {
        self.lock().pending.clone()
    }
}

fn save(path: &Path, state: &StoreState) -> Result<()> {
    let data = serde_yaml::to_string(state)?;
    io::atomic_write(path, data.as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn input(first: &str, number: u32) -> StudentInput {
        StudentInput {
            first_name: Some(first.into()),
            father_name: Some("حسن".into()),
            gender: Some("ذكر".into()),
            dob: Some("2005".into()),
            registry_type: Some("صباحي".into()),
            registry_number: Some(number.to_string()),
            registry_page: Some("1".into()),
            specialist: Some("كهرباء".into()),
            ..Default::default()
        }
    }

    fn record(id: &str, first: &str) -> StudentRecord {
        StudentRecord::from_input(id, &input(first, 1), &Catalog::default()).unwrap()
    }

    fn open_tmp() -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        RecordStore::init(dir.path()).unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RecordStore::open(dir.path()),
            Err(RegistryError::NotInitialized)
        ));
    }

    #[test]
    fn insert_persists_across_reopen() {
        let (dir, store) = open_tmp();
        store.insert_record(record("s1", "علي")).unwrap();
        drop(store);

        let reopened = RecordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list_active().len(), 1);
        assert_eq!(reopened.get("s1").unwrap().first_name, "علي");
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let (_dir, store) = open_tmp();
        store.insert_record(record("s1", "علي")).unwrap();
        assert!(store.insert_record(record("s1", "عمر")).is_err());
        assert_eq!(store.snapshot().students.len(), 1);
    }

    #[test]
    fn update_merges_and_recomputes() {
        let (_dir, store) = open_tmp();
        store.insert_record(record("s1", "علي")).unwrap();
        let patch = StudentInput {
            registry_number: Some("99".into()),
            ..Default::default()
        };
        let updated = store
            .update_record("s1", &patch, &Catalog::default())
            .unwrap();
        assert_eq!(updated.first_name, "علي");
        assert_eq!(updated.roll_number_id, "EL05R09900001");
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let (_dir, store) = open_tmp();
        let err = store
            .update_record("ghost", &StudentInput::default(), &Catalog::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::StudentNotFound(_)));
    }

    #[test]
    fn archive_hides_from_active_but_keeps_record() {
        let (_dir, store) = open_tmp();
        store.insert_record(record("s1", "علي")).unwrap();
        store.insert_record(record("s2", "عمر")).unwrap();
        store.archive("s1").unwrap();

        let active = store.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "s2");
        assert!(store.get("s1").unwrap().archived);
        assert!(matches!(
            store.archive("ghost"),
            Err(RegistryError::StudentNotFound(_))
        ));
    }

    #[test]
    fn failed_transaction_changes_nothing() {
        let (dir, store) = open_tmp();
        store.insert_record(record("s1", "علي")).unwrap();
        let before = std::fs::read_to_string(paths::store_path(dir.path())).unwrap();

        let result: Result<()> = store.transact(|s| {
            s.insert_record(record("s2", "عمر"))?;
            s.push_pending(
                PendingChange::Create {
                    payload: record("s3", "زيد"),
                },
                &Caller::writer("clerk"),
                None,
            );
            Err(RegistryError::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().students.len(), 1);
        assert!(store.pending().is_empty());
        assert_eq!(
            std::fs::read_to_string(paths::store_path(dir.path())).unwrap(),
            before
        );
    }

    #[test]
    fn pending_ids_survive_removal() {
        let (_dir, store) = open_tmp();
        let caller = Caller::writer("clerk");
        let first = store
            .transact(|s| {
                Ok(s.push_pending(
                    PendingChange::Create {
                        payload: record("a", "علي"),
                    },
                    &caller,
                    None,
                ))
            })
            .unwrap();
        store.transact(|s| s.take_pending(&first.id)).unwrap();
        let second = store
            .transact(|s| {
                Ok(s.push_pending(
                    PendingChange::Create {
                        payload: record("b", "عمر"),
                    },
                    &caller,
                    None,
                ))
            })
            .unwrap();
        assert_eq!(first.id, "P1");
        assert_eq!(second.id, "P2");
        assert!(matches!(
            store.transact(|s| s.take_pending("P1")),
            Err(RegistryError::PendingNotFound(_))
        ));
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let (_dir, store) = open_tmp();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        store
                            .insert_record(record(&format!("t{t}-{i}"), "علي"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.list_active().len(), 40);
    }
}
