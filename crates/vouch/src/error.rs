use thiserror::Error;
use vouch_core::ErrorKind;

/// Error type of the holder facade and binary, aggregating the errors of
/// every workspace crate.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] vouch_core::VouchError),

    #[error("vault error: {0}")]
    Vault(#[from] vouch_vault::VaultError),

    #[error("credential error: {0}")]
    Credential(#[from] vouch_cred::CredError),

    #[error("proof error: {0}")]
    Proof(#[from] vouch_proof::ProofError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RootError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RootError::Core(e) => e.kind(),
            RootError::Vault(e) => e.kind(),
            RootError::Credential(e) => e.kind(),
            RootError::Proof(e) => e.kind(),
            RootError::Config(_) | RootError::Serialization(_) => ErrorKind::Malformed,
            RootError::Internal(_) | RootError::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_proof::ProofError;
    use vouch_vault::VaultError;

    #[test]
    fn test_root_error_display() {
        let err = RootError::Internal("something broke".into());
        assert_eq!(err.to_string(), "internal error: something broke");
    }

    #[test]
    fn test_root_error_config() {
        let err = RootError::Config("missing vault path".into());
        assert_eq!(err.to_string(), "configuration error: missing vault path");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_kind_passes_through() {
        let err: RootError = VaultError::CredentialNotFound("c".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: RootError = ProofError::RevokedCredential("r".into()).into();
        assert_eq!(err.kind(), ErrorKind::Revoked);
    }

    #[test]
    fn test_from_serde_json() {
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RootError = e.into();
        assert!(matches!(err, RootError::Serialization(_)));
    }

    #[test]
    fn test_from_toml() {
        let e = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: RootError = e.into();
        assert!(err.to_string().starts_with("configuration error: TOML parse error"));
    }
}
