//! Approval workflow engine.
//!
//! Per mutation attempt:
//!
//! ```text
//! Requested ──(supervisor/admin)──▶ Committed
//!     │
//!     └──(writer)──▶ Pending ──approve──▶ Committed
//!                        └────reject───▶ Rejected
//! ```
//!
//! Every attempt, including one refused for trust or invalid input, appends
//! exactly one audit entry. Refusals never touch the store. The audit append
//! follows the store commit; if it fails the commit stands and the failure is
//! logged.

use crate::audit::{AuditEntry, AuditJournal};
use crate::catalog::{Catalog, CatalogHandle, SpecialistTrack};
use crate::config::{ensure_catalog, Config};
use crate::error::{RegistryError, Result};
use crate::pending::{PendingChange, PendingOperation};
use crate::record::{StudentInput, StudentRecord};
use crate::store::{AppliedOp, RecordStore, StoreState};
use crate::types::{AuditAction, Caller, Operation};
use crate::{io, paths};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a create or update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Committed { record: StudentRecord },
    Pending { pending: PendingOperation },
}

impl Outcome {
    pub fn roll_number(&self) -> &str {
        match self {
            Outcome::Committed { record } => &record.roll_number_id,
            Outcome::Pending { pending } => pending.change.roll_number(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending { .. })
    }
}

/// A submission either applied now or recognized as a replay of an op id.
#[derive(Debug, Clone)]
pub(crate) enum Applied {
    Fresh(Outcome),
    Duplicate(AppliedOp),
}

impl Applied {
    fn into_outcome(self) -> Result<Outcome> {
        match self {
            Applied::Fresh(outcome) => Ok(outcome),
            Applied::Duplicate(_) => Err(RegistryError::Validation(
                "operation was already applied".to_string(),
            )),
        }
    }
}

/// What `init` found or wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub config_created: bool,
    pub store_created: bool,
}

/// Reference data shown to form clients.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub school: String,
    pub specialists: Vec<SpecialistTrack>,
    pub registry_types: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    config: Config,
    catalog: CatalogHandle,
    store: RecordStore,
    journal: AuditJournal,
}

impl Registry {
    /// Create `.registry/` with a default config and an empty store.
    /// Existing files are left alone.
    pub fn init(root: &Path) -> Result<InitReport> {
        io::ensure_dir(&paths::registry_dir(root))?;
        let config_created = if paths::config_path(root).exists() {
            false
        } else {
            Config::default().save(root)?;
            true
        };
        let store_created = RecordStore::init(root)?;
        Ok(InitReport {
            config_created,
            store_created,
        })
    }

    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        ensure_catalog(&config.catalog)?;
        let store = RecordStore::open(root)?;
        let journal = AuditJournal::open(&paths::audit_path(root))?;
        Ok(Self {
            root: root.to_path_buf(),
            catalog: CatalogHandle::new(config.catalog.clone()),
            config,
            store,
            journal,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load()
    }

    pub fn meta(&self) -> Meta {
        let catalog = self.catalog();
        Meta {
            school: self.config.school.name.clone(),
            specialists: catalog.specialists.clone(),
            registry_types: catalog.registry_types.clone(),
        }
    }

    pub(crate) fn store(&self) -> &RecordStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Gatekeeping and audit plumbing
    // -----------------------------------------------------------------------

    /// Refuse (and audit the refusal) when the caller is below `op`'s tier.
    pub(crate) fn authorize(&self, caller: &Caller, op: Operation) -> Result<()> {
        let required = op.required_trust();
        if caller.trust >= required {
            return Ok(());
        }
        tracing::warn!(user = %caller.user, role = %caller.trust, operation = %op, "denied");
        self.record_audit(
            caller,
            AuditAction::Denied,
            json!({ "operation": op.as_str(), "required": required }),
        );
        Err(RegistryError::Forbidden {
            action: op.as_str().to_string(),
            required,
            actual: caller.trust,
        })
    }

    /// Audit a refused request and hand the error back. Storage faults are
    /// not workflow transitions and are only logged.
    pub(crate) fn refuse<T>(
        &self,
        caller: &Caller,
        op: Operation,
        target: Option<&str>,
        err: RegistryError,
    ) -> Result<T> {
        use crate::error::ErrorKind;
        match err.kind() {
            ErrorKind::Storage => {
                tracing::error!(user = %caller.user, operation = %op, error = %err, "storage fault");
            }
            kind => {
                tracing::warn!(user = %caller.user, operation = %op, error = %err, "rejected");
                self.record_audit(
                    caller,
                    AuditAction::Rejected,
                    json!({
                        "operation": op.as_str(),
                        "target": target,
                        "kind": kind,
                        "reason": err.to_string(),
                    }),
                );
            }
        }
        Err(err)
    }

    pub(crate) fn record_audit(&self, caller: &Caller, action: AuditAction, payload: serde_json::Value) {
        if let Err(e) = self.journal.append(AuditEntry::new(caller, action, payload)) {
            tracing::error!(user = %caller.user, action = %action, error = %e, "audit append failed");
        }
    }

    // -----------------------------------------------------------------------
    // Create / update
    // -----------------------------------------------------------------------

    /// Create a student. Writers get a pending item; supervisors and admins
    /// commit immediately.
    pub fn create(&self, caller: &Caller, input: &StudentInput) -> Result<Outcome> {
        self.submit_create(caller, input, None)?.into_outcome()
    }

    /// Patch a student. Fields absent from `patch` are preserved.
    pub fn update(&self, caller: &Caller, id: &str, patch: &StudentInput) -> Result<Outcome> {
        self.submit_update(caller, id, patch, None)?.into_outcome()
    }

    pub(crate) fn submit_create(
        &self,
        caller: &Caller,
        input: &StudentInput,
        op_id: Option<&str>,
    ) -> Result<Applied> {
        self.authorize(caller, Operation::Create)?;
        let catalog = self.catalog();

        let record = match StudentRecord::from_input(Uuid::new_v4().to_string(), input, &catalog) {
            Ok(r) => r,
            Err(e) => return self.refuse(caller, Operation::Create, None, e),
        };

        let result = self.store.transact(|s| {
            if let Some(prev) = op_id.and_then(|op| s.applied_op(op)) {
                return Ok(Applied::Duplicate(prev.clone()));
            }
            let outcome = if caller.trust.commits_directly() {
                s.insert_record(record.clone())?;
                Outcome::Committed {
                    record: record.clone(),
                }
            } else {
                let pending = s.push_pending(
                    PendingChange::Create {
                        payload: record.clone(),
                    },
                    caller,
                    op_id.map(str::to_string),
                );
                Outcome::Pending { pending }
            };
            remember_op(s, op_id, &outcome);
            Ok(Applied::Fresh(outcome))
        });

        let applied = match result {
            Ok(a) => a,
            Err(e) => return self.refuse(caller, Operation::Create, None, e),
        };
        if let Applied::Fresh(outcome) = &applied {
            self.audit_submission(caller, AuditAction::CreateStudent, outcome, op_id);
        }
        Ok(applied)
    }

    pub(crate) fn submit_update(
        &self,
        caller: &Caller,
        id: &str,
        patch: &StudentInput,
        op_id: Option<&str>,
    ) -> Result<Applied> {
        self.authorize(caller, Operation::Update)?;
        let catalog = self.catalog();

        let normalized = match patch.normalized() {
            Ok(p) => p,
            Err(e) => return self.refuse(caller, Operation::Update, Some(id), e),
        };

        let result = self.store.transact(|s| {
            if let Some(prev) = op_id.and_then(|op| s.applied_op(op)) {
                return Ok(Applied::Duplicate(prev.clone()));
            }
            let outcome = if caller.trust.commits_directly() {
                let record = s.update_record(id, &normalized, &catalog)?;
                Outcome::Committed { record }
            } else {
                // Validate against the current record so a bad patch is
                // refused now rather than at approval time.
                let mut preview = s
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RegistryError::StudentNotFound(id.to_string()))?;
                preview.apply(&normalized)?;
                preview.finalize(&catalog)?;
                let pending = s.push_pending(
                    PendingChange::Update {
                        target_id: id.to_string(),
                        payload: normalized.clone(),
                        preview_roll_number: preview.roll_number_id,
                    },
                    caller,
                    op_id.map(str::to_string),
                );
                Outcome::Pending { pending }
            };
            remember_op(s, op_id, &outcome);
            Ok(Applied::Fresh(outcome))
        });

        let applied = match result {
            Ok(a) => a,
            Err(e) => return self.refuse(caller, Operation::Update, Some(id), e),
        };
        if let Applied::Fresh(outcome) = &applied {
            self.audit_submission(caller, AuditAction::UpdateStudent, outcome, op_id);
        }
        Ok(applied)
    }

    /// `committed` is the action recorded when the outcome was a direct commit.
    fn audit_submission(
        &self,
        caller: &Caller,
        committed: AuditAction,
        outcome: &Outcome,
        op_id: Option<&str>,
    ) {
        match outcome {
            Outcome::Committed { record } => {
                let action = committed;
                tracing::info!(user = %caller.user, record = %record.id, roll = %record.roll_number_id, %action, "committed");
                self.record_audit(
                    caller,
                    action,
                    json!({ "record": record, "op_id": op_id }),
                );
            }
            Outcome::Pending { pending } => {
                let action = match &pending.change {
                    PendingChange::Create { .. } => AuditAction::RequestCreate,
                    PendingChange::Update { .. } => AuditAction::RequestUpdate,
                };
                tracing::info!(user = %caller.user, pending = %pending.id, %action, "queued for approval");
                self.record_audit(
                    caller,
                    action,
                    json!({
                        "pending_id": pending.id,
                        "record_id": pending.change.record_id(),
                        "roll": pending.change.roll_number(),
                        "op_id": op_id,
                    }),
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Approval
    // -----------------------------------------------------------------------

    /// Commit a pending item. An update whose target record has disappeared
    /// is refused with `StudentNotFound` and stays queued.
    pub fn approve_pending(&self, caller: &Caller, pending_id: &str) -> Result<StudentRecord> {
        self.authorize(caller, Operation::Approve)?;
        let catalog = self.catalog();

        let result = self.store.transact(|s| {
            let item = s.pending_item(pending_id)?.clone();
            let record = match &item.change {
                PendingChange::Create { payload } => {
                    let mut record = payload.clone();
                    record.finalize(&catalog)?;
                    s.insert_record(record.clone())?;
                    record
                }
                PendingChange::Update {
                    target_id, payload, ..
                } => s.update_record(target_id, payload, &catalog)?,
            };
            s.take_pending(pending_id)?;
            Ok((item, record))
        });

        let (item, record) = match result {
            Ok(v) => v,
            Err(e) => return self.refuse(caller, Operation::Approve, Some(pending_id), e),
        };
        tracing::info!(user = %caller.user, pending = %item.id, record = %record.id, "approved");
        self.record_audit(
            caller,
            AuditAction::ApprovePending,
            json!({
                "pending_id": item.id,
                "kind": item.change.kind(),
                "requested_by": item.requested_by,
                "record": record,
            }),
        );
        Ok(record)
    }

    /// Drop a pending item without committing it.
    pub fn reject_pending(
        &self,
        caller: &Caller,
        pending_id: &str,
        reason: Option<&str>,
    ) -> Result<PendingOperation> {
        self.authorize(caller, Operation::Reject)?;
        let item = match self.store.transact(|s| s.take_pending(pending_id)) {
            Ok(item) => item,
            Err(e) => return self.refuse(caller, Operation::Reject, Some(pending_id), e),
        };
        tracing::info!(user = %caller.user, pending = %item.id, "rejected pending item");
        self.record_audit(
            caller,
            AuditAction::RejectPending,
            json!({
                "pending_id": item.id,
                "kind": item.change.kind(),
                "requested_by": item.requested_by,
                "reason": reason,
            }),
        );
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Archive
    // -----------------------------------------------------------------------

    pub fn archive(&self, caller: &Caller, id: &str) -> Result<StudentRecord> {
        self.authorize(caller, Operation::Archive)?;
        let record = match self.store.archive(id) {
            Ok(r) => r,
            Err(e) => return self.refuse(caller, Operation::Archive, Some(id), e),
        };
        tracing::info!(user = %caller.user, record = %id, "archived");
        self.record_audit(caller, AuditAction::ArchiveStudent, json!({ "id": id }));
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn list_active(&self) -> Vec<StudentRecord> {
        self.store.list_active()
    }

    pub fn get(&self, id: &str) -> Result<StudentRecord> {
        self.store
            .get(id)
            .ok_or_else(|| RegistryError::StudentNotFound(id.to_string()))
    }

    /// Full store contents, archived records included.
    pub fn snapshot(&self) -> StoreState {
        self.store.snapshot()
    }

    pub fn pending_list(&self, caller: &Caller) -> Result<Vec<PendingOperation>> {
        self.authorize(caller, Operation::ViewPending)?;
        Ok(self.store.pending())
    }

    /// Newest-first audit entries; `limit` defaults to `audit.default_tail`.
    pub fn audit_tail(&self, caller: &Caller, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        self.authorize(caller, Operation::ViewAudit)?;
        self.journal.tail(limit.unwrap_or(self.config.audit.default_tail))
    }

    // -----------------------------------------------------------------------
    // Catalog reload
    // -----------------------------------------------------------------------

    /// Replace the specialist and registry-type tables in one step.
    pub fn reload_catalog(&self, caller: &Caller, catalog: Catalog) -> Result<()> {
        self.authorize(caller, Operation::ReloadCatalog)?;
        if let Err(e) = ensure_catalog(&catalog) {
            return self.refuse(caller, Operation::ReloadCatalog, None, e);
        }
        let payload = json!({
            "specialists": catalog.specialists.len(),
            "registry_types": catalog.registry_types.len(),
        });
        self.catalog.swap(catalog);
        tracing::info!(user = %caller.user, "catalog reloaded");
        self.record_audit(caller, AuditAction::ReloadCatalog, payload);
        Ok(())
    }
}

fn remember_op(s: &mut StoreState, op_id: Option<&str>, outcome: &Outcome) {
    let Some(op_id) = op_id else {
        return;
    };
    let (record_id, pending_id) = match outcome {
        Outcome::Committed { record } => (Some(record.id.clone()), None),
        Outcome::Pending { pending } => (None, Some(pending.id.clone())),
    };
    s.record_applied_op(
        op_id,
        AppliedOp {
            record_id,
            pending_id,
            applied_at: Utc::now(),
        },
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
