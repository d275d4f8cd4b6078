use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TrustLevel
// ---------------------------------------------------------------------------

/// Caller authorization tier. Declaration order is the trust order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Writer,
    Supervisor,
    Admin,
}

impl TrustLevel {
    pub fn all() -> &'static [TrustLevel] {
        &[TrustLevel::Writer, TrustLevel::Supervisor, TrustLevel::Admin]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Writer => "writer",
            TrustLevel::Supervisor => "supervisor",
            TrustLevel::Admin => "admin",
        }
    }

    /// Writers never commit directly; everything they submit is queued.
    pub fn commits_directly(self) -> bool {
        self >= TrustLevel::Supervisor
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrustLevel {
    type Err = crate::error::RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "writer" => Ok(TrustLevel::Writer),
            "supervisor" => Ok(TrustLevel::Supervisor),
            "admin" => Ok(TrustLevel::Admin),
            _ => Err(crate::error::RegistryError::Validation(format!(
                "unknown trust level '{s}': must be writer, supervisor, or admin"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Caller
// ---------------------------------------------------------------------------

/// Identity and trust label delivered by the transport with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user: String,
    pub trust: TrustLevel,
}

impl Caller {
    pub fn new(user: impl Into<String>, trust: TrustLevel) -> Self {
        let user = user.into();
        let user = if user.trim().is_empty() {
            "anonymous".to_string()
        } else {
            user
        };
        Self { user, trust }
    }

    pub fn writer(user: impl Into<String>) -> Self {
        Self::new(user, TrustLevel::Writer)
    }

    pub fn supervisor(user: impl Into<String>) -> Self {
        Self::new(user, TrustLevel::Supervisor)
    }

    pub fn admin(user: impl Into<String>) -> Self {
        Self::new(user, TrustLevel::Admin)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Every request the workflow gates, with its minimum trust level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Approve,
    Reject,
    Archive,
    Import,
    Export,
    ViewPending,
    ViewAudit,
    ReloadCatalog,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Approve => "approve",
            Operation::Reject => "reject",
            Operation::Archive => "archive",
            Operation::Import => "import",
            Operation::Export => "export",
            Operation::ViewPending => "view_pending",
            Operation::ViewAudit => "view_audit",
            Operation::ReloadCatalog => "reload_catalog",
        }
    }

    pub fn required_trust(self) -> TrustLevel {
        match self {
            Operation::Create | Operation::Update => TrustLevel::Writer,
            Operation::Approve
            | Operation::Reject
            | Operation::ViewPending
            | Operation::ViewAudit => TrustLevel::Supervisor,
            Operation::Archive
            | Operation::Import
            | Operation::Export
            | Operation::ReloadCatalog => TrustLevel::Admin,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RequestCreate,
    RequestUpdate,
    CreateStudent,
    UpdateStudent,
    ApprovePending,
    RejectPending,
    ArchiveStudent,
    ImportCsv,
    ReloadCatalog,
    /// Refused for insufficient trust.
    Denied,
    /// Refused for invalid input or a missing target.
    Rejected,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::RequestCreate => "request_create",
            AuditAction::RequestUpdate => "request_update",
            AuditAction::CreateStudent => "create_student",
            AuditAction::UpdateStudent => "update_student",
            AuditAction::ApprovePending => "approve_pending",
            AuditAction::RejectPending => "reject_pending",
            AuditAction::ArchiveStudent => "archive_student",
            AuditAction::ImportCsv => "import_csv",
            AuditAction::ReloadCatalog => "reload_catalog",
            AuditAction::Denied => "denied",
            AuditAction::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
