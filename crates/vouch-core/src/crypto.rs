//! BN254 building blocks shared by request, materialization and proof code.
//!
//! Everything here is deterministic except [`random_scalar`]. Points and
//! scalars travel as hex of their compressed arkworks encoding.

use std::fmt;

use ark_ec::AffineRepr;
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

pub use ark_bn254::{Bn254, Fq, Fr, G1Affine, G1Projective, G2Affine, G2Projective};

use crate::error::{VouchError, VouchResult};

/// Domain tag for the per-index revocation element.
pub const REV_ELEMENT_DOMAIN: &[u8] = b"vouch/rev-element";
/// Domain tag for hashing non-integer attribute encodings into the field.
pub const ATTRIBUTE_DOMAIN: &[u8] = b"vouch/attribute";

/// Uniformly random scalar from the OS RNG.
pub fn random_scalar() -> Fr {
    Fr::rand(&mut rand::rngs::OsRng)
}

/// Hash arbitrary bytes to a scalar. Uses 64 bytes of SHA-512 output so the
/// reduction bias is negligible.
pub fn hash_to_scalar(domain: &[u8], data: &[u8]) -> Fr {
    let mut hasher = Sha512::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    hasher.update(data);
    Fr::from_le_bytes_mod_order(&hasher.finalize())
}

/// Try-and-increment hash to G1.
///
/// BN254 G1 has cofactor 1, so every curve point found is in the prime
/// order subgroup. The discrete log of the result is unknown.
pub fn hash_to_g1(domain: &[u8], label: &[u8]) -> G1Affine {
    let mut counter: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update((label.len() as u64).to_le_bytes());
        hasher.update(label);
        hasher.update(counter.to_le_bytes());
        let x = Fq::from_be_bytes_mod_order(&hasher.finalize());
        if let Some(point) = G1Affine::get_point_from_x_unchecked(x, true) {
            let point = point.clear_cofactor();
            if !point.is_zero() {
                return point;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

/// Signed integer embedded into the scalar field.
pub fn int_scalar(value: i64) -> Fr {
    if value >= 0 {
        Fr::from(value as u64)
    } else {
        -Fr::from(value.unsigned_abs())
    }
}

// ---------------------------------------------------------------------------
// Attribute encoding
// ---------------------------------------------------------------------------

/// Canonical encoding of a raw attribute value.
///
/// Values that parse as a 32-bit signed integer encode to their decimal form
/// so predicates can operate on them. Everything else encodes to the hex
/// SHA-256 of the raw UTF-8 bytes.
pub fn encode_attribute(raw: &str) -> String {
    match raw.trim().parse::<i32>() {
        Ok(v) => v.to_string(),
        Err(_) => hex::encode(Sha256::digest(raw.as_bytes())),
    }
}

/// Integer value carried by an encoding, if it is one.
pub fn encoded_int(encoded: &str) -> Option<i32> {
    encoded.parse::<i32>().ok()
}

/// Map an encoded attribute to the scalar that gets signed.
pub fn attribute_scalar(encoded: &str) -> Fr {
    match encoded_int(encoded) {
        Some(v) => int_scalar(v as i64),
        None => hash_to_scalar(ATTRIBUTE_DOMAIN, encoded.as_bytes()),
    }
}

// ---------------------------------------------------------------------------
// Byte encoding
// ---------------------------------------------------------------------------

/// Compressed canonical encoding.
pub fn to_bytes<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    // writing into a Vec never fails
    let _ = value.serialize_compressed(&mut bytes);
    bytes
}

pub fn from_bytes<T: CanonicalDeserialize>(bytes: &[u8]) -> VouchResult<T> {
    T::deserialize_compressed(bytes)
        .map_err(|e| VouchError::InvalidEncoding(format!("{:?}", e)))
}

pub fn to_hex<T: CanonicalSerialize>(value: &T) -> String {
    hex::encode(to_bytes(value))
}

pub fn from_hex<T: CanonicalDeserialize>(s: &str) -> VouchResult<T> {
    let bytes = hex::decode(s).map_err(|e| VouchError::InvalidEncoding(e.to_string()))?;
    from_bytes(&bytes)
}

/// Serde adapter: one arkworks value as a hex string.
pub mod ark_hex {
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        serializer.serialize_str(&super::to_hex(value))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter: a list of arkworks values as hex strings.
pub mod ark_hex_vec {
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let encoded: Vec<String> = values.iter().map(super::to_hex).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| super::from_hex(s).map_err(de::Error::custom))
            .collect()
    }
}

/// Serde adapter: a name-keyed map of arkworks values as hex strings.
pub mod ark_hex_map {
    use std::collections::BTreeMap;

    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(values: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let encoded: BTreeMap<&String, String> =
            values.iter().map(|(k, v)| (k, super::to_hex(v))).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                super::from_hex(&v)
                    .map(|value| (k, value))
                    .map_err(de::Error::custom)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Fiat–Shamir transcript
// ---------------------------------------------------------------------------

pub trait TranscriptProtocol {
    fn append_point<T: CanonicalSerialize>(&mut self, label: &'static [u8], point: &T);
    fn append_scalar(&mut self, label: &'static [u8], scalar: &Fr);
    fn challenge_scalar(&mut self, label: &'static [u8]) -> Fr;
}

impl TranscriptProtocol for merlin::Transcript {
    fn append_point<T: CanonicalSerialize>(&mut self, label: &'static [u8], point: &T) {
        self.append_message(label, &to_bytes(point));
    }

    fn append_scalar(&mut self, label: &'static [u8], scalar: &Fr) {
        self.append_message(label, &to_bytes(scalar));
    }

    fn challenge_scalar(&mut self, label: &'static [u8]) -> Fr {
        let mut bytes = [0u8; 64];
        self.challenge_bytes(label, &mut bytes);
        Fr::from_le_bytes_mod_order(&bytes)
    }
}

// ---------------------------------------------------------------------------
// LinkSecret: the holder's master secret
// ---------------------------------------------------------------------------

/// Holder master secret. Signed blindly into every credential and proven
/// equal across the sub-proofs of a presentation. Never serialized outside
/// the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkSecret(Fr);

impl LinkSecret {
    pub fn generate() -> Self {
        let mut value = random_scalar();
        while value.is_zero() {
            value = random_scalar();
        }
        Self(value)
    }

    pub fn from_scalar(value: Fr) -> VouchResult<Self> {
        if value.is_zero() {
            return Err(VouchError::InvalidEncoding(
                "link secret must be non-zero".into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Fr {
        self.0
    }

    /// Vault encoding.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> VouchResult<Self> {
        Self::from_scalar(from_hex(s)?)
    }
}

impl fmt::Debug for LinkSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkSecret(<redacted>)")
    }
}

impl Drop for LinkSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::pairing::Pairing;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[test]
    fn test_encode_integer_attribute() {
        assert_eq!(encode_attribute("30"), "30");
        assert_eq!(encode_attribute("-5"), "-5");
        assert_eq!(encode_attribute("007"), "7");
    }

    #[test]
    fn test_encode_string_attribute() {
        let encoded = encode_attribute("Alice");
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded, hex::encode(Sha256::digest(b"Alice")));
        assert!(encoded_int(&encoded).is_none());
    }

    #[test]
    fn test_encode_out_of_range_integer_is_hashed() {
        let encoded = encode_attribute("4294967296");
        assert_eq!(encoded.len(), 64);
    }

    #[test]
    fn test_int_scalar_negative() {
        assert_eq!(int_scalar(-3) + int_scalar(3), Fr::zero());
        assert_eq!(attribute_scalar("12"), Fr::from(12u64));
    }

    #[test]
    fn test_hash_to_g1_deterministic_and_distinct() {
        let a = hash_to_g1(b"test", b"a");
        let b = hash_to_g1(b"test", b"b");
        assert_eq!(a, hash_to_g1(b"test", b"a"));
        assert_ne!(a, b);
        assert!(a.is_on_curve());
        assert!(!a.is_zero());
    }

    #[test]
    fn test_hash_to_g1_pairs_like_a_group_element() {
        let p = hash_to_g1(b"test", b"p");
        let x = random_scalar();
        let lhs = Bn254::pairing(p * x, G2Affine::generator());
        let rhs = Bn254::pairing(p, G2Affine::generator() * x);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_hash_to_scalar_domain_separation() {
        assert_ne!(hash_to_scalar(b"a", b"x"), hash_to_scalar(b"b", b"x"));
        assert_eq!(hash_to_scalar(b"a", b"x"), hash_to_scalar(b"a", b"x"));
    }

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "ark_hex")]
        point: G1Affine,
        #[serde(with = "ark_hex_vec")]
        scalars: Vec<Fr>,
        #[serde(with = "ark_hex_map")]
        named: BTreeMap<String, Fr>,
    }

    #[test]
    fn test_ark_hex_serde() {
        let mut named = BTreeMap::new();
        named.insert("age".to_string(), Fr::from(30u64));
        let w = Wrapper {
            point: hash_to_g1(b"test", b"serde"),
            scalars: vec![Fr::from(1u64), random_scalar()],
            named,
        };
        let json = serde_json::to_string(&w).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.point, w.point);
        assert_eq!(back.scalars, w.scalars);
        assert_eq!(back.named, w.named);
    }

    #[test]
    fn test_ark_hex_rejects_garbage() {
        let result: Result<Wrapper, _> =
            serde_json::from_str(r#"{"point":"zz","scalars":[],"named":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_transcript_challenge_is_deterministic() {
        let mut t1 = merlin::Transcript::new(b"test");
        let mut t2 = merlin::Transcript::new(b"test");
        t1.append_scalar(b"x", &Fr::from(7u64));
        t2.append_scalar(b"x", &Fr::from(7u64));
        assert_eq!(t1.challenge_scalar(b"c"), t2.challenge_scalar(b"c"));

        let mut t3 = merlin::Transcript::new(b"test");
        t3.append_scalar(b"x", &Fr::from(8u64));
        let mut t4 = merlin::Transcript::new(b"test");
        t4.append_scalar(b"x", &Fr::from(7u64));
        assert_ne!(t3.challenge_scalar(b"c"), t4.challenge_scalar(b"c"));
    }

    #[test]
    fn test_link_secret_hex_and_debug() {
        let secret = LinkSecret::generate();
        let back = LinkSecret::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(back, secret);
        assert_eq!(format!("{:?}", secret), "LinkSecret(<redacted>)");
        assert!(LinkSecret::from_scalar(Fr::zero()).is_err());
    }
}
