use crate::types::TrustLevel;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not initialized: run 'registry init'")]
    NotInitialized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid date of birth '{0}': expected YYYY, YYYY-MM or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("pending item not found: {0}")]
    PendingNotFound(String),

    #[error("forbidden: '{action}' requires {required}, caller is {actual}")]
    Forbidden {
        action: String,
        required: TrustLevel,
        actual: TrustLevel,
    },

    #[error("storage fault: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation(_) | RegistryError::InvalidDate(_) => ErrorKind::Validation,
            RegistryError::StudentNotFound(_) | RegistryError::PendingNotFound(_) => {
                ErrorKind::NotFound
            }
            RegistryError::Forbidden { .. } => ErrorKind::Forbidden,
            RegistryError::NotInitialized
            | RegistryError::Storage(_)
            | RegistryError::Io(_)
            | RegistryError::Yaml(_)
            | RegistryError::Json(_)
            | RegistryError::Csv(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn storage(e: impl fmt::Display) -> Self {
        RegistryError::Storage(e.to_string())
    }
}
