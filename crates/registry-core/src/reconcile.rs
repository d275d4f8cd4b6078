//! Replays operations queued by clients while they were offline.
//!
//! Ops go through the same create/update path as live requests, so a writer's
//! ops land in the pending queue. Each op is its own store transaction and
//! one failure does not stop the batch. Every applied op id is recorded in
//! the store's ledger in the same transaction as its mutation; replaying the
//! id later reports `duplicate` and changes nothing.

use crate::error::{ErrorKind, RegistryError, Result};
use crate::record::StudentInput;
use crate::types::{Caller, Operation};
use crate::workflow::{Applied, Outcome, Registry};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncAction {
    Create {
        payload: StudentInput,
    },
    /// `target_id` falls back to `payload.id` when absent.
    Update {
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        payload: StudentInput,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    #[serde(rename = "opId")]
    pub op_id: String,
    #[serde(flatten)]
    pub action: SyncAction,
}

/// Either `{"operations": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SyncBatch {
    Wrapped { operations: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Split a sync document into raw ops. Individual ops are decoded later so
/// one malformed op does not sink the batch.
pub fn parse_batch(text: &str) -> Result<Vec<serde_json::Value>> {
    let batch: SyncBatch = serde_json::from_str(text)?;
    Ok(match batch {
        SyncBatch::Wrapped { operations } => operations,
        SyncBatch::Bare(ops) => ops,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Committed,
    Pending,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub op_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
}

impl SyncResult {
    fn failed(op_id: String, err: &RegistryError) -> Self {
        Self {
            op_id,
            ok: false,
            outcome: None,
            record_id: None,
            pending_id: None,
            error: Some(SyncError {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }

    fn applied(op_id: String, applied: Applied) -> Self {
        let (outcome, record_id, pending_id) = match applied {
            Applied::Fresh(Outcome::Committed { record }) => {
                (SyncOutcome::Committed, Some(record.id), None)
            }
            Applied::Fresh(Outcome::Pending { pending }) => {
                (SyncOutcome::Pending, None, Some(pending.id))
            }
            Applied::Duplicate(prev) => (SyncOutcome::Duplicate, prev.record_id, prev.pending_id),
        };
        Self {
            op_id,
            ok: true,
            outcome: Some(outcome),
            record_id,
            pending_id,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

impl Registry {
    /// Apply `ops` in order and report one result per op.
    pub fn reconcile(&self, caller: &Caller, ops: &[SyncOperation]) -> Vec<SyncResult> {
        let results: Vec<SyncResult> = ops.iter().map(|op| self.sync_one(caller, op)).collect();
        log_batch(caller, &results);
        results
    }

    /// Like [`Registry::reconcile`] for ops not yet decoded. An op that does
    /// not decode is reported as a validation failure in its slot.
    pub fn reconcile_raw(&self, caller: &Caller, raw: Vec<serde_json::Value>) -> Vec<SyncResult> {
        let results: Vec<SyncResult> = raw
            .into_iter()
            .map(|value| {
                let op_id = value
                    .get("opId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                match serde_json::from_value::<SyncOperation>(value) {
                    Ok(op) => self.sync_one(caller, &op),
                    Err(e) => SyncResult::failed(
                        op_id,
                        &RegistryError::Validation(format!("malformed operation: {e}")),
                    ),
                }
            })
            .collect();
        log_batch(caller, &results);
        results
    }

    fn sync_one(&self, caller: &Caller, op: &SyncOperation) -> SyncResult {
        match self.apply_sync_op(caller, op) {
            Ok(applied) => SyncResult::applied(op.op_id.clone(), applied),
            Err(e) => SyncResult::failed(op.op_id.clone(), &e),
        }
    }

    fn apply_sync_op(&self, caller: &Caller, op: &SyncOperation) -> Result<Applied> {
        let op_id = op.op_id.trim();
        match &op.action {
            SyncAction::Create { payload } => {
                if op_id.is_empty() {
                    return self.refuse(caller, Operation::Create, None, empty_op_id());
                }
                self.submit_create(caller, payload, Some(op_id))
            }
            SyncAction::Update { target_id, payload } => {
                let target = target_id
                    .as_deref()
                    .or(payload.id.as_deref())
                    .map(str::trim)
                    .filter(|t| !t.is_empty());
                let Some(target) = target else {
                    let err = RegistryError::Validation("update needs targetId or payload id".into());
                    return self.refuse(caller, Operation::Update, None, err);
                };
                if op_id.is_empty() {
                    return self.refuse(caller, Operation::Update, Some(target), empty_op_id());
                }
                self.submit_update(caller, target, payload, Some(op_id))
            }
        }
    }
}

fn empty_op_id() -> RegistryError {
    RegistryError::Validation("opId must not be empty".into())
}

fn log_batch(caller: &Caller, results: &[SyncResult]) {
    tracing::info!(
        user = %caller.user,
        ops = results.len(),
        failed = results.iter().filter(|r| !r.ok).count(),
        "reconciled offline batch"
    );
}
