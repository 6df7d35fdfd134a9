use thiserror::Error;
use vouch_core::{ErrorKind, VouchError};
use vouch_vault::VaultError;

/// Errors of the request and materialization paths.
///
/// Messages name identifiers and structural problems only; they never carry
/// attribute values, blindings or signature material.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredError {
    #[error("invalid credential definition: {0}")]
    InvalidCredentialDefinition(String),

    #[error("invalid credential offer: {0}")]
    InvalidOffer(String),

    #[error("invalid holder DID")]
    InvalidHolderDid,

    #[error("missing revocation info: {0}")]
    MissingRevocationInfo(String),

    #[error("credential verification failed: {0}")]
    CredentialVerificationFailed(String),

    #[error("credential id already in use: {0}")]
    DuplicateCredentialId(String),

    #[error("attribute not in credential: {0}")]
    UnknownAttribute(String),

    #[error("invalid credential request: {0}")]
    InvalidRequest(String),

    #[error("vault error: {0}")]
    Vault(VaultError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CredError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CredError::InvalidCredentialDefinition(_)
            | CredError::InvalidOffer(_)
            | CredError::InvalidHolderDid
            | CredError::MissingRevocationInfo(_)
            | CredError::UnknownAttribute(_)
            | CredError::InvalidRequest(_) => ErrorKind::Malformed,
            CredError::CredentialVerificationFailed(_) => ErrorKind::VerificationFailed,
            CredError::DuplicateCredentialId(_) => ErrorKind::DuplicateId,
            CredError::Vault(e) => e.kind(),
            CredError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<VaultError> for CredError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::DuplicateCredentialId(id) => CredError::DuplicateCredentialId(id),
            VaultError::UnknownAttribute(name) => CredError::UnknownAttribute(name),
            VaultError::UnverifiedCredential(_) => {
                CredError::CredentialVerificationFailed("signature does not verify".into())
            }
            other => CredError::Vault(other),
        }
    }
}

impl From<VouchError> for CredError {
    fn from(e: VouchError) -> Self {
        match e {
            VouchError::InvalidDefinition(msg) => CredError::InvalidCredentialDefinition(msg),
            other => CredError::Internal(other.to_string()),
        }
    }
}

pub type CredResult<T> = Result<T, CredError>;
