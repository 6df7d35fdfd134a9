//! The holder's credential store.
//!
//! Layout in the backend: `credential:<id>` holds the JSON
//! [`CredentialRecord`] (MIME entries included), `link-secret:<id>` holds
//! the hex link secret. No cross-record indexes exist.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};
use vouch_core::crypto::LinkSecret;
use vouch_core::{
    CredentialDefinition, CredentialId, CredentialRecord, CredentialSource, LinkSecretId,
    RecordId, StorageBackend, VouchResult,
};

use crate::error::{VaultError, VaultResult};

/// A record whose signature verified against its credential definition
/// and the link secret it is bound to. The only thing
/// [`CredentialStore::insert`] accepts.
#[derive(Debug, Clone)]
pub struct VerifiedRecord(CredentialRecord);

impl VerifiedRecord {
    pub fn check(
        record: CredentialRecord,
        cred_def: &CredentialDefinition,
        link_secret: &LinkSecret,
    ) -> VaultResult<Self> {
        if !record.signature_verifies(cred_def, link_secret.value()) {
            return Err(VaultError::UnverifiedCredential(record.id.to_string()));
        }
        Ok(Self(record))
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.0
    }

    pub fn into_record(self) -> CredentialRecord {
        self.0
    }
}

pub struct CredentialStore<S: StorageBackend> {
    backend: S,
    write_lock: Mutex<()>,
}

impl<S: StorageBackend> CredentialStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn lock_writes(&self) -> VaultResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| VaultError::Storage(format!("write lock poisoned: {}", e)))
    }

    /// Owned copy of a stored credential.
    pub fn get(&self, id: &CredentialId) -> VaultResult<CredentialRecord> {
        self.find(id)?
            .ok_or_else(|| VaultError::CredentialNotFound(id.to_string()))
    }

    fn find(&self, id: &CredentialId) -> VaultResult<Option<CredentialRecord>> {
        match self.backend.get(&RecordId::credential(id))? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    VaultError::Serialization(format!("corrupt credential record: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn contains(&self, id: &CredentialId) -> VaultResult<bool> {
        Ok(self.backend.exists(&RecordId::credential(id))?)
    }

    /// Create-if-absent. The record and its MIME entries land in one write.
    pub fn insert(&self, verified: &VerifiedRecord) -> VaultResult<()> {
        let record = verified.record();
        let bytes = serde_json::to_vec(record)
            .map_err(|e| VaultError::Serialization(format!("serialize record: {}", e)))?;
        let _guard = self.lock_writes()?;
        let created =
            self.backend
                .compare_and_swap(&RecordId::credential(&record.id), None, &bytes)?;
        if !created {
            warn!(credential_id = %record.id, "credential id already in use");
            return Err(VaultError::DuplicateCredentialId(record.id.to_string()));
        }
        info!(
            credential_id = %record.id,
            cred_def_id = %record.cred_def_id,
            attributes = record.attributes.len(),
            "credential stored"
        );
        Ok(())
    }

    /// Remove a credential and its MIME entries. Irrecoverable.
    pub fn delete(&self, id: &CredentialId) -> VaultResult<()> {
        let _guard = self.lock_writes()?;
        if !self.backend.delete(&RecordId::credential(id))? {
            return Err(VaultError::CredentialNotFound(id.to_string()));
        }
        info!(credential_id = %id, "credential deleted");
        Ok(())
    }

    /// MIME type of one attribute. Unknown attribute or no recorded MIME
    /// type gives `None`; unknown credential is an error.
    pub fn mime_type_of(&self, id: &CredentialId, attribute: &str) -> VaultResult<Option<String>> {
        let record = self.get(id)?;
        Ok(record.mime_type(attribute).map(str::to_string))
    }

    /// Every recorded MIME type of a credential.
    pub fn mime_types_of(&self, id: &CredentialId) -> VaultResult<BTreeMap<String, String>> {
        Ok(self.get(id)?.mime_types())
    }

    // -----------------------------------------------------------------------
    // Link secrets
    // -----------------------------------------------------------------------

    pub fn store_link_secret(&self, id: &LinkSecretId, secret: &LinkSecret) -> VaultResult<()> {
        let encoded = zeroize::Zeroizing::new(secret.to_hex());
        let _guard = self.lock_writes()?;
        let created = self.backend.compare_and_swap(
            &RecordId::link_secret(id),
            None,
            encoded.as_bytes(),
        )?;
        if !created {
            return Err(VaultError::DuplicateLinkSecretId(id.to_string()));
        }
        info!(link_secret_id = %id, "link secret stored");
        Ok(())
    }

    pub fn link_secret(&self, id: &LinkSecretId) -> VaultResult<LinkSecret> {
        let bytes = zeroize::Zeroizing::new(
            self.backend
                .get(&RecordId::link_secret(id))?
                .ok_or_else(|| VaultError::LinkSecretNotFound(id.to_string()))?,
        );
        let encoded = std::str::from_utf8(&bytes)
            .map_err(|_| VaultError::Serialization("link secret is not utf-8".into()))?;
        Ok(LinkSecret::from_hex(encoded)?)
    }

    /// Existing link secret, or a fresh one stored under `id`.
    pub fn ensure_link_secret(&self, id: &LinkSecretId) -> VaultResult<LinkSecret> {
        match self.link_secret(id) {
            Ok(secret) => Ok(secret),
            Err(VaultError::LinkSecretNotFound(_)) => {
                let secret = LinkSecret::generate();
                match self.store_link_secret(id, &secret) {
                    Ok(()) => Ok(secret),
                    // Lost a race with another creator; theirs wins.
                    Err(VaultError::DuplicateLinkSecretId(_)) => self.link_secret(id),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

impl<S: StorageBackend> CredentialSource for CredentialStore<S> {
    fn credential(&self, id: &CredentialId) -> VouchResult<Option<CredentialRecord>> {
        let record = self.find(id)?;
        debug!(credential_id = %id, found = record.is_some(), "credential lookup");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_backend::InMemoryBackend;
    use fixtures::Fixture;
    use std::sync::Arc;
    use std::thread;

    mod fixtures {
        use std::collections::BTreeMap;
        use vouch_core::crypto::{encode_attribute, Fr, LinkSecret};
        use vouch_core::testing::TestSigner;
        use vouch_core::{
            AttributeEntry, CredDefId, CredentialId, CredentialRecord, CredentialSignature,
            Generators, LinkSecretId, SchemaId,
        };

        use crate::credential_store::VerifiedRecord;

        pub struct Fixture {
            pub signer: TestSigner,
            pub secret: LinkSecret,
        }

        impl Fixture {
            pub fn new() -> Self {
                Self {
                    signer: TestSigner::new(&["name", "age"]),
                    secret: LinkSecret::generate(),
                }
            }

            pub fn unsigned(&self, id: &str) -> CredentialRecord {
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "name".to_string(),
                    AttributeEntry {
                        raw: "Alice".into(),
                        encoded: encode_attribute("Alice"),
                        mime_type: Some("text/plain".into()),
                    },
                );
                attributes.insert(
                    "age".to_string(),
                    AttributeEntry {
                        raw: "30".into(),
                        encoded: encode_attribute("30"),
                        mime_type: None,
                    },
                );
                CredentialRecord {
                    id: CredentialId::new(id),
                    schema_id: SchemaId::new("schema"),
                    cred_def_id: CredDefId::new("cred-def"),
                    issuer_id: "issuer".into(),
                    attributes,
                    signature: CredentialSignature {
                        a: Generators::g1(),
                        e: Fr::from(3u64),
                        s: Fr::from(4u64),
                    },
                    rev_reg_id: None,
                    rev_index: None,
                    link_secret_id: LinkSecretId::new("default"),
                }
            }

            pub fn record(&self, id: &str) -> VerifiedRecord {
                let mut record = self.unsigned(id);
                self.signer.sign(&mut record, &self.secret).unwrap();
                VerifiedRecord::check(record, self.signer.cred_def(), &self.secret).unwrap()
            }
        }
    }

    fn store() -> CredentialStore<InMemoryBackend> {
        CredentialStore::new(InMemoryBackend::new())
    }

    #[test]
    fn test_insert_get() {
        let store = store();
        let verified = Fixture::new().record("cred-1");
        store.insert(&verified).unwrap();
        let record = verified.record();
        assert_eq!(&store.get(&record.id).unwrap(), record);
        assert!(store.contains(&record.id).unwrap());
    }

    #[test]
    fn test_unsigned_record_never_verifies() {
        let f = Fixture::new();
        let result = VerifiedRecord::check(f.unsigned("forged"), f.signer.cred_def(), &f.secret);
        assert!(matches!(result, Err(VaultError::UnverifiedCredential(_))));
    }

    #[test]
    fn test_record_for_another_link_secret_rejected() {
        let f = Fixture::new();
        let record = f.record("cred-1").into_record();
        let result = VerifiedRecord::check(record, f.signer.cred_def(), &LinkSecret::generate());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), vouch_core::ErrorKind::VerificationFailed);
    }

    #[test]
    fn test_duplicate_insert_rejected_and_original_kept() {
        let store = store();
        let f = Fixture::new();
        let first = f.record("cred-1");
        store.insert(&first).unwrap();
        let second = f.record("cred-1");
        assert!(matches!(
            store.insert(&second),
            Err(VaultError::DuplicateCredentialId(_))
        ));
        assert_eq!(&store.get(&first.record().id).unwrap(), first.record());
    }

    #[test]
    fn test_delete_then_get_not_found() {
        let store = store();
        let verified = Fixture::new().record("cred-1");
        store.insert(&verified).unwrap();
        let id = &verified.record().id;
        store.delete(id).unwrap();
        assert!(matches!(store.get(id), Err(VaultError::CredentialNotFound(_))));
        assert!(matches!(
            store.delete(id),
            Err(VaultError::CredentialNotFound(_))
        ));
    }

    #[test]
    fn test_mime_lookups() {
        let store = store();
        let verified = Fixture::new().record("cred-1");
        store.insert(&verified).unwrap();
        let id = &verified.record().id;
        assert_eq!(
            store.mime_type_of(id, "name").unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(store.mime_type_of(id, "age").unwrap(), None);
        assert_eq!(store.mime_type_of(id, "nope").unwrap(), None);
        assert_eq!(store.mime_types_of(id).unwrap().len(), 1);
        assert!(matches!(
            store.mime_type_of(&CredentialId::new("missing"), "name"),
            Err(VaultError::CredentialNotFound(_))
        ));
    }

    #[test]
    fn test_mime_entries_removed_with_credential() {
        let store = store();
        let verified = Fixture::new().record("cred-1");
        store.insert(&verified).unwrap();
        let id = &verified.record().id;
        store.delete(id).unwrap();
        assert!(store.mime_types_of(id).is_err());
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_concurrent_insert_same_id_one_wins() {
        let store = Arc::new(store());
        let f = Fixture::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let verified = f.record("contested");
                thread::spawn(move || store.insert(&verified).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_link_secret_persistence() {
        let store = store();
        let id = LinkSecretId::new("default");
        assert!(matches!(
            store.link_secret(&id),
            Err(VaultError::LinkSecretNotFound(_))
        ));
        let created = store.ensure_link_secret(&id).unwrap();
        assert_eq!(store.link_secret(&id).unwrap(), created);
        assert_eq!(store.ensure_link_secret(&id).unwrap(), created);
        assert!(matches!(
            store.store_link_secret(&id, &LinkSecret::generate()),
            Err(VaultError::DuplicateLinkSecretId(_))
        ));
    }

    #[test]
    fn test_credential_source_view() {
        let store = store();
        let verified = Fixture::new().record("cred-1");
        store.insert(&verified).unwrap();
        let source: &dyn CredentialSource = &store;
        assert!(source.credential(&verified.record().id).unwrap().is_some());
        assert!(source
            .credential(&CredentialId::new("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_record_is_serialization_error() {
        let store = store();
        store
            .backend()
            .put(&RecordId::credential(&CredentialId::new("bad")), b"{")
            .unwrap();
        assert!(matches!(
            store.get(&CredentialId::new("bad")),
            Err(VaultError::Serialization(_))
        ));
    }
}
