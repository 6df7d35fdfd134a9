use thiserror::Error;
use vouch_core::{ErrorKind, VouchError};

/// Errors of presentation construction and verification.
///
/// Cryptographic failures carry referents and identifiers only, never
/// attribute values or witness material.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProofError {
    #[error("invalid presentation request: {0}")]
    InvalidRequest(String),

    #[error("referent not covered by requested credentials: {0}")]
    MissingReferent(String),

    #[error("requested credentials name an unknown referent: {0}")]
    UnknownReferent(String),

    #[error("referent covered more than once: {0}")]
    AmbiguousReferent(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("attribute {attribute} not in credential {credential}")]
    AttributeNotInCredential {
        credential: String,
        attribute: String,
    },

    #[error("credential {0} is not bound to the presenting link secret")]
    UnboundCredential(String),

    #[error("restriction not satisfied for referent {0}")]
    RestrictionNotSatisfied(String),

    #[error("predicate not satisfied for referent {0}")]
    PredicateNotSatisfied(String),

    #[error("ledger object not supplied: {0}")]
    MissingLedgerObject(String),

    #[error("invalid ledger object: {0}")]
    InvalidLedgerObject(String),

    #[error("no revocation state for registry {0}")]
    MissingRevocationState(String),

    #[error("stale revocation state for registry {0}")]
    StaleRevocationState(String),

    #[error("credential revoked in registry {0}")]
    RevokedCredential(String),

    #[error("invalid revocation state: {0}")]
    InvalidRevocationState(String),

    #[error("malformed presentation: {0}")]
    MalformedPresentation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProofError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProofError::CredentialNotFound(_) | ProofError::MissingLedgerObject(_) => {
                ErrorKind::NotFound
            }
            ProofError::InvalidRequest(_)
            | ProofError::MissingReferent(_)
            | ProofError::UnknownReferent(_)
            | ProofError::AmbiguousReferent(_)
            | ProofError::AttributeNotInCredential { .. }
            | ProofError::RestrictionNotSatisfied(_)
            | ProofError::PredicateNotSatisfied(_)
            | ProofError::InvalidLedgerObject(_)
            | ProofError::MalformedPresentation(_) => ErrorKind::Malformed,
            ProofError::MissingRevocationState(_) | ProofError::StaleRevocationState(_) => {
                ErrorKind::StaleState
            }
            ProofError::RevokedCredential(_) => ErrorKind::Revoked,
            ProofError::InvalidRevocationState(_) | ProofError::UnboundCredential(_) => {
                ErrorKind::VerificationFailed
            }
            ProofError::Storage(_) | ProofError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<VouchError> for ProofError {
    fn from(e: VouchError) -> Self {
        match e {
            VouchError::InvalidDefinition(msg) | VouchError::InvalidEncoding(msg) => {
                ProofError::InvalidLedgerObject(msg)
            }
            VouchError::Storage(msg) => ProofError::Storage(msg),
            other => ProofError::Internal(other.to_string()),
        }
    }
}

pub type ProofResult<T> = Result<T, ProofError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ProofError::AttributeNotInCredential {
            credential: "cred-1".into(),
            attribute: "height".into(),
        };
        assert_eq!(e.to_string(), "attribute height not in credential cred-1");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ProofError::CredentialNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ProofError::RevokedCredential("reg".into()).kind(),
            ErrorKind::Revoked
        );
        assert_eq!(
            ProofError::StaleRevocationState("reg".into()).kind(),
            ErrorKind::StaleState
        );
        assert_eq!(
            ProofError::MissingReferent("attr1".into()).kind(),
            ErrorKind::Malformed
        );
    }

    #[test]
    fn test_from_vouch_error() {
        let e: ProofError = VouchError::Storage("disk".into()).into();
        assert!(matches!(e, ProofError::Storage(_)));
        let e: ProofError = VouchError::InvalidDefinition("bad".into()).into();
        assert_eq!(e.kind(), ErrorKind::Malformed);
    }
}
