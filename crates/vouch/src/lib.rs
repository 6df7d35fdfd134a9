//! Vouch Holder Library
//!
//! Holder side of an anonymous-credential system: stores BBS+ credentials
//! issued by third parties and builds zero-knowledge presentations that
//! disclose only what a verifier asks for.
//!
//! # Architecture
//!
//! ```text
//! vouch (facade, config, CLI)
//!   ├── vouch-cred   credential requests, materialization
//!   ├── vouch-proof  presentation building and verification
//!   └── vouch-vault  encrypted credential store
//!         └── vouch-core  shared types, ledger objects, curve helpers
//! ```
//!
//! `initialize_root` turns a [`RootConfig`] into a ready [`Holder`] over
//! blind, encrypted storage.

pub mod config;
pub mod error;
pub mod holder;
pub mod ledger;

pub use config::{HolderConfig, ProofSystem, RootConfig, VaultBackendKind, VaultConfig};
pub use error::{RootError, RootResult};
pub use holder::{BbsHolder, CredentialHolder, Holder};
pub use ledger::{InMemoryLedger, LedgerDocument};

use std::path::Path;

use tracing::info;
use vouch_core::{LinkSecretId, RecordId, StorageBackend, VouchResult};
use vouch_vault::{
    BlindStorageWrapper, CredentialStore, InMemoryBackend, KeyHierarchy, SqliteBackend,
};
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Storage backend chosen at runtime
// ---------------------------------------------------------------------------

pub enum VaultBackend {
    Memory(InMemoryBackend),
    Sqlite(SqliteBackend),
}

impl VaultBackend {
    fn inner(&self) -> &dyn StorageBackend {
        match self {
            VaultBackend::Memory(b) => b,
            VaultBackend::Sqlite(b) => b,
        }
    }
}

impl StorageBackend for VaultBackend {
    fn get(&self, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>> {
        self.inner().get(record_id)
    }

    fn put(&self, record_id: &RecordId, value: &[u8]) -> VouchResult<()> {
        self.inner().put(record_id, value)
    }

    fn delete(&self, record_id: &RecordId) -> VouchResult<bool> {
        self.inner().delete(record_id)
    }

    fn compare_and_swap(
        &self,
        record_id: &RecordId,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> VouchResult<bool> {
        self.inner().compare_and_swap(record_id, expected, new_value)
    }

    fn exists(&self, record_id: &RecordId) -> VouchResult<bool> {
        self.inner().exists(record_id)
    }
}

/// Backend of a running holder: blind ids, sealed records.
pub type VaultStore = BlindStorageWrapper<VaultBackend>;

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Runtime state of the holder. Created by `initialize_root`.
pub struct RootState {
    pub config: RootConfig,
    pub holder: Holder<VaultStore>,
}

/// Initialize the holder from configuration.
///
/// Creates `data_dir` and the root key on first run, opens the configured
/// backend behind blind storage, and makes sure the link secret exists.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    config.validate()?;

    info!(
        data_dir = %config.data_dir.display(),
        backend = ?config.vault.backend,
        "initializing vouch holder"
    );

    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        RootError::Internal(format!(
            "failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        ))
    })?;

    let keys = load_or_create_root_key(&config.root_key_path())?;
    let backend = open_backend(&config)?;
    let store = CredentialStore::new(BlindStorageWrapper::from_hierarchy(backend, &keys)?);
    let holder = Holder::new(
        config.holder.proof_system,
        store,
        LinkSecretId::new(config.holder.link_secret_id.clone()),
    )?;

    info!("vouch holder initialized");
    Ok(RootState { config, holder })
}

fn load_or_create_root_key(path: &Path) -> RootResult<KeyHierarchy> {
    if path.exists() {
        let encoded = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            RootError::Internal(format!("failed to read {}: {}", path.display(), e))
        })?);
        return Ok(KeyHierarchy::from_hex(&encoded)?);
    }

    let encoded = KeyHierarchy::generate_root_key_hex();
    std::fs::write(path, encoded.as_bytes()).map_err(|e| {
        RootError::Internal(format!("failed to write {}: {}", path.display(), e))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }
    info!(path = %path.display(), "new vault root key created");
    Ok(KeyHierarchy::from_hex(&encoded)?)
}

fn open_backend(config: &RootConfig) -> RootResult<VaultBackend> {
    match config.vault.backend {
        VaultBackendKind::Memory => Ok(VaultBackend::Memory(InMemoryBackend::new())),
        VaultBackendKind::Sqlite => {
            let path = config
                .vault_path()
                .ok_or_else(|| RootError::Config("the sqlite backend needs vault.path".into()))?;
            Ok(VaultBackend::Sqlite(SqliteBackend::open(&path)?))
        }
    }
}
