use thiserror::Error;
use vouch_core::{ErrorKind, VouchError};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("link secret not found: {0}")]
    LinkSecretNotFound(String),

    #[error("credential id already in use: {0}")]
    DuplicateCredentialId(String),

    #[error("link secret id already in use: {0}")]
    DuplicateLinkSecretId(String),

    #[error("credential signature does not verify: {0}")]
    UnverifiedCredential(String),

    #[error("attribute not in credential: {0}")]
    UnknownAttribute(String),

    #[error("invalid MIME type for {attribute}: {reason}")]
    InvalidMimeType { attribute: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::CredentialNotFound(_) | VaultError::LinkSecretNotFound(_) => {
                ErrorKind::NotFound
            }
            VaultError::DuplicateCredentialId(_) | VaultError::DuplicateLinkSecretId(_) => {
                ErrorKind::DuplicateId
            }
            VaultError::UnverifiedCredential(_) => ErrorKind::VerificationFailed,
            VaultError::UnknownAttribute(_)
            | VaultError::InvalidMimeType { .. }
            | VaultError::Serialization(_) => ErrorKind::Malformed,
            VaultError::KeyDerivation(_)
            | VaultError::Encryption(_)
            | VaultError::Decryption(_)
            | VaultError::Storage(_)
            | VaultError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<VouchError> for VaultError {
    fn from(e: VouchError) -> Self {
        match e {
            VouchError::Storage(msg) => VaultError::Storage(msg),
            VouchError::Serialization(msg) | VouchError::InvalidEncoding(msg) => {
                VaultError::Serialization(msg)
            }
            other => VaultError::Internal(other.to_string()),
        }
    }
}

impl From<VaultError> for VouchError {
    fn from(e: VaultError) -> Self {
        VouchError::Storage(e.to_string())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
