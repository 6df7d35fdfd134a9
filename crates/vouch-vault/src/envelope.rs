use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

// AES-256-GCM envelope encryption.
//
// Every record is sealed under its own data key. The storage address is
// passed as associated data, so a ciphertext moved to another address fails
// to open.

const NONCE_SIZE: usize = 12;

/// Nonce plus ciphertext (GCM tag included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(with = "hex_nonce")]
    pub nonce: [u8; NONCE_SIZE],
    #[serde(with = "hex_vec")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    pub fn to_bytes(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VaultError::Encryption(format!("failed to serialize envelope: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| VaultError::Decryption(format!("failed to parse envelope: {}", e)))
    }
}

pub fn encrypt(
    key: &Zeroizing<[u8; 32]>,
    plaintext: &[u8],
    aad: &[u8],
) -> VaultResult<EncryptedEnvelope> {
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| VaultError::Encryption(format!("cipher init failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            AesNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| VaultError::Encryption(format!("encryption failed: {}", e)))?;

    Ok(EncryptedEnvelope {
        nonce: nonce_bytes,
        ciphertext,
    })
}

pub fn decrypt(
    key: &Zeroizing<[u8; 32]>,
    envelope: &EncryptedEnvelope,
    aad: &[u8],
) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| VaultError::Decryption(format!("cipher init failed: {}", e)))?;

    cipher
        .decrypt(
            AesNonce::from_slice(&envelope.nonce),
            Payload {
                msg: envelope.ciphertext.as_ref(),
                aad,
            },
        )
        .map_err(|e| VaultError::Decryption(format!("decryption failed: {}", e)))
}

mod hex_nonce {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 12], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 12], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 12 nonce bytes"))
    }
}

mod hex_vec {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Zeroizing<[u8; 32]> {
        Zeroizing::new([0x42; 32])
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = test_key();
        let envelope = encrypt(&key, b"credential record", b"addr").unwrap();
        assert_eq!(
            decrypt(&key, &envelope, b"addr").unwrap(),
            b"credential record"
        );
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let key = test_key();
        let e1 = encrypt(&key, b"same", b"addr").unwrap();
        let e2 = encrypt(&key, b"same", b"addr").unwrap();
        assert_ne!(e1.nonce, e2.nonce);
        assert_ne!(e1.ciphertext, e2.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = encrypt(&Zeroizing::new([1u8; 32]), b"secret", b"addr").unwrap();
        assert!(decrypt(&Zeroizing::new([2u8; 32]), &envelope, b"addr").is_err());
    }

    #[test]
    fn test_wrong_address_fails() {
        let key = test_key();
        let envelope = encrypt(&key, b"secret", b"addr-1").unwrap();
        assert!(matches!(
            decrypt(&key, &envelope, b"addr-2"),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key();
        let mut envelope = encrypt(&key, b"integrity", b"addr").unwrap();
        if let Some(byte) = envelope.ciphertext.first_mut() {
            *byte ^= 0x01;
        }
        assert!(decrypt(&key, &envelope, b"addr").is_err());
    }

    #[test]
    fn test_envelope_bytes() {
        let key = test_key();
        let envelope = encrypt(&key, b"", b"addr").unwrap();
        let parsed = EncryptedEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.nonce, envelope.nonce);
        assert_eq!(decrypt(&key, &parsed, b"addr").unwrap(), b"");
        assert!(EncryptedEnvelope::from_bytes(b"not json").is_err());
    }
}
