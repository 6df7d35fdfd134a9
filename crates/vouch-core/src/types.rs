use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(CredentialId, "Holder-assigned identifier of a stored credential.");
define_id!(SchemaId, "Ledger identifier of a schema.");
define_id!(CredDefId, "Ledger identifier of a credential definition.");
define_id!(RevRegId, "Ledger identifier of a revocation registry.");
define_id!(LinkSecretId, "Vault identifier of a holder link secret.");
define_id!(RecordId, "Opaque storage key handed to a StorageBackend.");

impl CredentialId {
    /// Fresh 128-bit random identifier, hex encoded.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

impl RecordId {
    pub fn credential(id: &CredentialId) -> Self {
        Self(format!("credential:{}", id))
    }

    pub fn link_secret(id: &LinkSecretId) -> Self {
        Self(format!("link-secret:{}", id))
    }
}

// ---------------------------------------------------------------------------
// Nonce: 32-byte freshness value for offers, requests and presentations
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Nonce {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(&self.0[..8]))
    }
}

impl Drop for Nonce {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_id_generate_is_hex_128_bit() {
        let id = CredentialId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(hex::decode(id.as_str()).is_ok());
        assert_ne!(id, CredentialId::generate());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = CredDefId::new("did:sov:issuer:3:CL:1:tag");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"did:sov:issuer:3:CL:1:tag\"");
        let back: CredDefId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_record_id_layout() {
        assert_eq!(
            RecordId::credential(&CredentialId::new("abc")).as_str(),
            "credential:abc"
        );
        assert_eq!(
            RecordId::link_secret(&LinkSecretId::new("default")).as_str(),
            "link-secret:default"
        );
    }

    #[test]
    fn test_empty_id() {
        assert!(SchemaId::new("  ").is_empty());
        assert!(!SchemaId::new("s").is_empty());
    }

    #[test]
    fn test_nonce_debug_is_truncated() {
        let nonce = Nonce([0xab; 32]);
        assert_eq!(format!("{:?}", nonce), "Nonce(abababababababab)");
    }

    #[test]
    fn test_nonce_serde() {
        let nonce = Nonce::generate();
        let json = serde_json::to_string(&nonce).unwrap();
        let back: Nonce = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nonce);
    }
}
