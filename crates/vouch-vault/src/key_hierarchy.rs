use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Vault keys derived from one 32-byte root key:
///
/// ```text
/// RootKey
///   → SealingKey     (HKDF, "vault-seal")
///       → per-record data keys (HKDF, opaque record id)
///   → AddressingKey  (HKDF, "blind-addressing")
/// ```
pub struct KeyHierarchy {
    root_key: Zeroizing<[u8; 32]>,
}

impl KeyHierarchy {
    pub fn from_raw_key(key: [u8; 32]) -> Self {
        Self {
            root_key: Zeroizing::new(key),
        }
    }

    /// Parse a hex-encoded root key, as written by `vouch init`.
    pub fn from_hex(encoded: &str) -> VaultResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| VaultError::KeyDerivation(format!("invalid root key: {}", e)))?,
        );
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::KeyDerivation("root key must be 32 bytes".into()))?;
        Ok(Self::from_raw_key(key))
    }

    /// Fresh random root key, hex encoded.
    pub fn generate_root_key_hex() -> Zeroizing<String> {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *key);
        Zeroizing::new(hex::encode(*key))
    }

    pub fn sealing_key(&self) -> VaultResult<Zeroizing<[u8; 32]>> {
        hkdf_derive(&*self.root_key, b"vault-seal", b"vouch-vault-sealing-key")
    }

    pub fn addressing_key(&self) -> VaultResult<Zeroizing<[u8; 32]>> {
        hkdf_derive(&*self.root_key, b"blind-addressing", b"vouch-addressing-key")
    }
}

/// HKDF-SHA256 to a 32-byte key.
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> VaultResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(info, &mut *okm)
        .map_err(|e| VaultError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealing_key_deterministic() {
        let kh = KeyHierarchy::from_raw_key([0x42; 32]);
        assert_eq!(*kh.sealing_key().unwrap(), *kh.sealing_key().unwrap());
        assert_ne!(*kh.sealing_key().unwrap(), [0x42; 32]);
    }

    #[test]
    fn test_keys_are_separated() {
        let kh = KeyHierarchy::from_raw_key([0x42; 32]);
        assert_ne!(*kh.sealing_key().unwrap(), *kh.addressing_key().unwrap());
    }

    #[test]
    fn test_different_roots_differ() {
        let a = KeyHierarchy::from_raw_key([1; 32]);
        let b = KeyHierarchy::from_raw_key([2; 32]);
        assert_ne!(*a.sealing_key().unwrap(), *b.sealing_key().unwrap());
    }

    #[test]
    fn test_hex_root_key() {
        let encoded = KeyHierarchy::generate_root_key_hex();
        assert_eq!(encoded.len(), 64);
        let a = KeyHierarchy::from_hex(&encoded).unwrap();
        let b = KeyHierarchy::from_hex(&format!("{}\n", &*encoded)).unwrap();
        assert_eq!(*a.addressing_key().unwrap(), *b.addressing_key().unwrap());
        assert!(KeyHierarchy::from_hex("abcd").is_err());
        assert!(KeyHierarchy::from_hex("not hex").is_err());
    }
}
