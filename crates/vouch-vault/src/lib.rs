pub mod blind_storage;
pub mod credential_store;
pub mod envelope;
pub mod error;
pub mod in_memory_backend;
pub mod key_hierarchy;
pub mod mime;

#[cfg(feature = "sqlite")]
pub mod storage;

pub use blind_storage::BlindStorageWrapper;
pub use credential_store::{CredentialStore, VerifiedRecord};
pub use error::*;
pub use in_memory_backend::InMemoryBackend;
pub use key_hierarchy::KeyHierarchy;

#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
