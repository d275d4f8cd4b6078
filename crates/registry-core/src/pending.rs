//! Writes from low-trust callers awaiting supervisor or admin approval.
//!
//! IDs are sequential: P1, P2, P3, … drawn from a counter persisted with the
//! store, so an id is never reused after its item is approved or rejected.

use crate::record::{StudentInput, StudentRecord};
use crate::types::TrustLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingChange {
    /// A complete, normalized record (id and roll number already assigned).
    Create { payload: StudentRecord },
    /// A normalized patch for `target_id`. `preview_roll_number` is what the
    /// roll number would have been at request time; approval recomputes it.
    Update {
        target_id: String,
        payload: StudentInput,
        preview_roll_number: String,
    },
}

impl PendingChange {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingChange::Create { .. } => PendingKind::Create,
            PendingChange::Update { .. } => PendingKind::Update,
        }
    }

    pub fn roll_number(&self) -> &str {
        match self {
            PendingChange::Create { payload } => &payload.roll_number_id,
            PendingChange::Update {
                preview_roll_number,
                ..
            } => preview_roll_number,
        }
    }

    /// Record id this change creates or modifies.
    pub fn record_id(&self) -> &str {
        match self {
            PendingChange::Create { payload } => &payload.id,
            PendingChange::Update { target_id, .. } => target_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Create,
    Update,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Create => f.write_str("create"),
            PendingKind::Update => f.write_str("update"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: String,
    #[serde(flatten)]
    pub change: PendingChange,
    pub requested_by: String,
    pub requested_role: TrustLevel,
    pub requested_at: DateTime<Utc>,
    /// Client operation id when the item arrived through offline sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_id: Option<String>,
}

/// Allocate the next pending id from the monotonic counter.
pub fn next_id(seq: &mut u64) -> String {
    *seq += 1;
    format!("P{}", *seq)
}
