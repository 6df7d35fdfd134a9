//! Blind addressing and envelope encryption over any [`StorageBackend`].
//!
//! The wrapped backend sees `SHA-256(addressing_key || id)` instead of the
//! semantic id, and an AES-256-GCM envelope instead of the value. Each
//! record is sealed under a data key derived from the sealing key and its
//! opaque id.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use vouch_core::{RecordId, StorageBackend, VouchResult};
use zeroize::Zeroizing;

use crate::envelope::{self, EncryptedEnvelope};
use crate::error::VaultResult;
use crate::key_hierarchy::{hkdf_derive, KeyHierarchy};

pub struct BlindStorageWrapper<S: StorageBackend> {
    inner: S,
    addressing_key: Zeroizing<[u8; 32]>,
    sealing_key: Zeroizing<[u8; 32]>,
}

impl<S: StorageBackend> BlindStorageWrapper<S> {
    pub fn new(
        inner: S,
        addressing_key: Zeroizing<[u8; 32]>,
        sealing_key: Zeroizing<[u8; 32]>,
    ) -> Self {
        Self {
            inner,
            addressing_key,
            sealing_key,
        }
    }

    pub fn from_hierarchy(inner: S, keys: &KeyHierarchy) -> VaultResult<Self> {
        Ok(Self::new(inner, keys.addressing_key()?, keys.sealing_key()?))
    }

    fn blind_id(&self, record_id: &RecordId) -> RecordId {
        let mut hasher = Sha256::new();
        hasher.update(*self.addressing_key);
        hasher.update(record_id.as_str().as_bytes());
        RecordId::new(hex::encode(hasher.finalize()))
    }

    fn seal(&self, opaque: &RecordId, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let dek = hkdf_derive(
            &*self.sealing_key,
            opaque.as_str().as_bytes(),
            b"vouch-record-dek",
        )?;
        envelope::encrypt(&dek, plaintext, opaque.as_str().as_bytes())?.to_bytes()
    }

    fn open(&self, opaque: &RecordId, sealed: &[u8]) -> VaultResult<Vec<u8>> {
        let dek = hkdf_derive(
            &*self.sealing_key,
            opaque.as_str().as_bytes(),
            b"vouch-record-dek",
        )?;
        let env = EncryptedEnvelope::from_bytes(sealed)?;
        envelope::decrypt(&dek, &env, opaque.as_str().as_bytes())
    }

    /// The raw backend, for inspection.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StorageBackend> StorageBackend for BlindStorageWrapper<S> {
    fn get(&self, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>> {
        let opaque = self.blind_id(record_id);
        match self.inner.get(&opaque)? {
            Some(sealed) => Ok(Some(self.open(&opaque, &sealed)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record_id: &RecordId, value: &[u8]) -> VouchResult<()> {
        let opaque = self.blind_id(record_id);
        let sealed = self.seal(&opaque, value)?;
        self.inner.put(&opaque, &sealed)
    }

    fn delete(&self, record_id: &RecordId) -> VouchResult<bool> {
        self.inner.delete(&self.blind_id(record_id))
    }

    /// Compares plaintexts, then swaps against the exact sealed bytes that
    /// were read, so a concurrent writer makes the inner swap fail.
    fn compare_and_swap(
        &self,
        record_id: &RecordId,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> VouchResult<bool> {
        let opaque = self.blind_id(record_id);
        let current_sealed = self.inner.get(&opaque)?;

        let matches = match (&current_sealed, expected) {
            (None, None) => true,
            (Some(sealed), Some(exp)) => {
                let current = self.open(&opaque, sealed)?;
                current.as_slice().ct_eq(exp).into()
            }
            _ => false,
        };
        if !matches {
            return Ok(false);
        }

        let sealed = self.seal(&opaque, new_value)?;
        self.inner
            .compare_and_swap(&opaque, current_sealed.as_deref(), &sealed)
    }

    fn exists(&self, record_id: &RecordId) -> VouchResult<bool> {
        self.inner.exists(&self.blind_id(record_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_backend::InMemoryBackend;

    fn wrapper() -> BlindStorageWrapper<InMemoryBackend> {
        BlindStorageWrapper::from_hierarchy(
            InMemoryBackend::new(),
            &KeyHierarchy::from_raw_key([0x42; 32]),
        )
        .unwrap()
    }

    #[test]
    fn test_put_get_through_wrapper() {
        let blind = wrapper();
        let id = RecordId::new("credential:abc");
        blind.put(&id, b"{\"attr\":\"Alice\"}").unwrap();
        assert_eq!(blind.get(&id).unwrap().unwrap(), b"{\"attr\":\"Alice\"}");
        assert!(blind.exists(&id).unwrap());
    }

    #[test]
    fn test_backend_never_sees_ids_or_plaintext() {
        let blind = wrapper();
        blind
            .put(&RecordId::new("credential:abc"), b"Alice")
            .unwrap();
        for (key, value) in blind.inner().entries() {
            assert!(!key.contains("credential"));
            assert_eq!(key.len(), 64);
            assert!(!value.windows(5).any(|w| w == b"Alice"));
        }
    }

    #[test]
    fn test_other_root_key_cannot_read() {
        let inner = InMemoryBackend::new();
        let writer =
            BlindStorageWrapper::from_hierarchy(inner, &KeyHierarchy::from_raw_key([1; 32]))
                .unwrap();
        writer.put(&RecordId::new("credential:a"), b"v").unwrap();
        let entries = writer.inner().entries();

        let other_inner = InMemoryBackend::new();
        for (k, v) in &entries {
            other_inner.put(&RecordId::new(k.clone()), v).unwrap();
        }
        let reader =
            BlindStorageWrapper::from_hierarchy(other_inner, &KeyHierarchy::from_raw_key([2; 32]))
                .unwrap();
        assert!(reader.get(&RecordId::new("credential:a")).unwrap().is_none());
    }

    #[test]
    fn test_create_if_absent() {
        let blind = wrapper();
        let id = RecordId::new("credential:abc");
        assert!(blind.compare_and_swap(&id, None, b"first").unwrap());
        assert!(!blind.compare_and_swap(&id, None, b"second").unwrap());
        assert_eq!(blind.get(&id).unwrap().unwrap(), b"first");
    }

    #[test]
    fn test_cas_compares_plaintext() {
        let blind = wrapper();
        let id = RecordId::new("link-secret:default");
        blind.put(&id, b"v1").unwrap();
        assert!(blind.compare_and_swap(&id, Some(b"v1"), b"v2").unwrap());
        assert!(!blind.compare_and_swap(&id, Some(b"v1"), b"v3").unwrap());
        assert_eq!(blind.get(&id).unwrap().unwrap(), b"v2");
    }

    #[test]
    fn test_delete() {
        let blind = wrapper();
        let id = RecordId::new("credential:abc");
        blind.put(&id, b"v").unwrap();
        assert!(blind.delete(&id).unwrap());
        assert!(!blind.delete(&id).unwrap());
        assert!(blind.get(&id).unwrap().is_none());
    }
}
