use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse failure taxonomy shared by every crate in the workspace.
///
/// Callers branch on the kind, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Identifier absent. The caller may retry with different input.
    NotFound,
    /// Input failed structural or cryptographic validation.
    Malformed,
    /// A signature or proof check failed. Security relevant.
    VerificationFailed,
    /// The credential is revoked. A business outcome, not a defect.
    Revoked,
    /// Collaborator state is outdated; re-resolve and retry.
    StaleState,
    /// Identifier already taken. Caller programming error.
    DuplicateId,
    /// Storage or environment failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Malformed => write!(f, "malformed"),
            ErrorKind::VerificationFailed => write!(f, "verification_failed"),
            ErrorKind::Revoked => write!(f, "revoked"),
            ErrorKind::StaleState => write!(f, "stale_state"),
            ErrorKind::DuplicateId => write!(f, "duplicate_id"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VouchError {
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VouchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VouchError::InvalidDefinition(_)
            | VouchError::InvalidEncoding(_)
            | VouchError::Serialization(_) => ErrorKind::Malformed,
            VouchError::Storage(_) | VouchError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type VouchResult<T> = Result<T, VouchError>;
