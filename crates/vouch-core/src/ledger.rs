//! Ledger objects the holder consumes: schemas, credential definitions,
//! revocation registry definitions and revocation states.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ark_ec::AffineRepr;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, ark_hex, ark_hex_vec, Fr, G1Affine, G1Projective, G2Affine};
use crate::error::{VouchError, VouchResult};
use crate::types::{CredDefId, RevRegId, SchemaId};

const GENERATOR_DOMAIN: &[u8] = b"vouch/bbs-generator";

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub id: SchemaId,
    pub name: String,
    pub version: String,
    pub issuer_id: String,
    pub attr_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// CredentialDefinition
// ---------------------------------------------------------------------------

/// Issuer public key material for one credential definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPublicKey {
    /// `g2 · x` for the issuer secret `x`.
    #[serde(with = "ark_hex")]
    pub w: G2Affine,
    /// Seed all message generators are hashed from.
    pub generator_seed: String,
    pub attr_names: Vec<String>,
    pub supports_revocation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinition {
    pub id: CredDefId,
    pub schema_id: SchemaId,
    pub issuer_id: String,
    pub tag: String,
    pub public_key: CredentialPublicKey,
}

impl CredentialDefinition {
    /// Structural checks on the key material.
    pub fn validate(&self) -> VouchResult<()> {
        let key = &self.public_key;
        if self.id.is_empty() {
            return Err(VouchError::InvalidDefinition(
                "credential definition id is empty".into(),
            ));
        }
        if key.w.is_zero() {
            return Err(VouchError::InvalidDefinition(
                "issuer key is the identity".into(),
            ));
        }
        if key.generator_seed.is_empty() {
            return Err(VouchError::InvalidDefinition("generator seed is empty".into()));
        }
        if key.attr_names.is_empty() {
            return Err(VouchError::InvalidDefinition(
                "credential definition has no attributes".into(),
            ));
        }
        let mut seen = HashSet::new();
        for name in &key.attr_names {
            if name.trim().is_empty() {
                return Err(VouchError::InvalidDefinition("empty attribute name".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(VouchError::InvalidDefinition(format!(
                    "duplicate attribute name: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn supports_revocation(&self) -> bool {
        self.public_key.supports_revocation
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.public_key.attr_names.iter().any(|n| n == name)
    }

    pub fn generators(&self) -> Generators {
        Generators::derive(&self.public_key.generator_seed, &self.public_key.attr_names)
    }
}

/// Message generators of one credential definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generators {
    pub h0: G1Affine,
    pub h_link: G1Affine,
    pub h_rev: G1Affine,
    pub attrs: BTreeMap<String, G1Affine>,
}

impl Generators {
    pub fn derive(seed: &str, attr_names: &[String]) -> Self {
        let labelled = |label: &str| {
            let mut input = Vec::with_capacity(seed.len() + label.len() + 1);
            input.extend_from_slice(seed.as_bytes());
            input.push(0);
            input.extend_from_slice(label.as_bytes());
            crypto::hash_to_g1(GENERATOR_DOMAIN, &input)
        };
        let attrs = attr_names
            .iter()
            .map(|name| (name.clone(), labelled(&format!("attr:{}", name))))
            .collect();
        Self {
            h0: labelled("blinding"),
            h_link: labelled("link-secret"),
            h_rev: labelled("revocation"),
            attrs,
        }
    }

    pub fn g1() -> G1Affine {
        G1Affine::generator()
    }

    pub fn g2() -> G2Affine {
        G2Affine::generator()
    }

    pub fn attr(&self, name: &str) -> VouchResult<G1Affine> {
        self.attrs
            .get(name)
            .copied()
            .ok_or_else(|| VouchError::InvalidDefinition(format!("no generator for {}", name)))
    }

    /// `B = g1 + h0·s + h_link·ms + h_rev·y + Σ h_i·m_i`, the point a BBS+
    /// signature signs.
    pub fn message_base(
        &self,
        s: Fr,
        link_secret: Fr,
        rev_element: Fr,
        attrs: &BTreeMap<String, Fr>,
    ) -> VouchResult<G1Projective> {
        let mut acc = Self::g1().into_group()
            + self.h0 * s
            + self.h_link * link_secret
            + self.h_rev * rev_element;
        for (name, value) in attrs {
            acc += self.attr(name)? * *value;
        }
        Ok(acc)
    }
}

// ---------------------------------------------------------------------------
// Revocation registry
// ---------------------------------------------------------------------------

/// Public parameters of a revocation registry.
///
/// `tails[k] = P·α^k` for `k = 0..=max_cred_num`; `q_tilde = g2·α`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryDefinition {
    pub id: RevRegId,
    pub cred_def_id: CredDefId,
    pub max_cred_num: u32,
    #[serde(with = "ark_hex")]
    pub q_tilde: G2Affine,
    #[serde(with = "ark_hex_vec")]
    pub tails: Vec<G1Affine>,
}

impl RevocationRegistryDefinition {
    pub fn validate(&self) -> VouchResult<()> {
        if self.q_tilde.is_zero() {
            return Err(VouchError::InvalidDefinition(
                "registry key is the identity".into(),
            ));
        }
        if self.tails.len() != self.max_cred_num as usize + 1 {
            return Err(VouchError::InvalidDefinition(format!(
                "expected {} tails points, found {}",
                self.max_cred_num as usize + 1,
                self.tails.len()
            )));
        }
        if self.tails.first().map_or(true, |p| p.is_zero()) {
            return Err(VouchError::InvalidDefinition("tails base is the identity".into()));
        }
        Ok(())
    }

    pub fn contains_index(&self, index: u32) -> bool {
        index >= 1 && index <= self.max_cred_num
    }
}

/// Registry state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationState {
    pub rev_reg_id: RevRegId,
    /// Time the accumulator value was observed.
    pub timestamp: u64,
    #[serde(with = "ark_hex")]
    pub accumulator: G1Affine,
    /// Indexes that are issued and not revoked.
    pub issued: BTreeSet<u32>,
    /// Latest time the registry is known to have changed.
    pub registry_updated_at: u64,
}

impl RevocationState {
    pub fn is_stale(&self) -> bool {
        self.registry_updated_at > self.timestamp
    }
}

/// Element `y_i` signed into the credential at registry index `i`.
pub fn revocation_element(rev_reg_id: &RevRegId, index: u32) -> Fr {
    let mut data = Vec::with_capacity(rev_reg_id.as_str().len() + 5);
    data.extend_from_slice(rev_reg_id.as_str().as_bytes());
    data.push(0);
    data.extend_from_slice(&index.to_le_bytes());
    crypto::hash_to_scalar(crypto::REV_ELEMENT_DOMAIN, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random_scalar;

    fn cred_def(attrs: &[&str]) -> CredentialDefinition {
        CredentialDefinition {
            id: CredDefId::new("issuer:3:CL:1:tag"),
            schema_id: SchemaId::new("issuer:2:person:1.0"),
            issuer_id: "issuer".into(),
            tag: "tag".into(),
            public_key: CredentialPublicKey {
                w: (G2Affine::generator() * random_scalar()).into(),
                generator_seed: "seed".into(),
                attr_names: attrs.iter().map(|s| s.to_string()).collect(),
                supports_revocation: false,
            },
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(cred_def(&["name", "age"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_identity_key() {
        let mut def = cred_def(&["name"]);
        def.public_key.w = G2Affine::zero();
        assert!(matches!(
            def.validate(),
            Err(VouchError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_empty_attrs() {
        assert!(cred_def(&["name", "name"]).validate().is_err());
        assert!(cred_def(&[]).validate().is_err());
        assert!(cred_def(&["name", " "]).validate().is_err());
    }

    #[test]
    fn test_generators_distinct_and_stable() {
        let def = cred_def(&["name", "age"]);
        let g = def.generators();
        assert_eq!(g, def.generators());
        assert_ne!(g.h0, g.h_link);
        assert_ne!(g.h_link, g.h_rev);
        assert_ne!(g.attr("name").unwrap(), g.attr("age").unwrap());
        assert!(g.attr("missing").is_err());
    }

    #[test]
    fn test_cred_def_serde() {
        let def = cred_def(&["name"]);
        let json = serde_json::to_string(&def).unwrap();
        let back: CredentialDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_revocation_element_depends_on_registry_and_index() {
        let a = RevRegId::new("reg-a");
        let b = RevRegId::new("reg-b");
        assert_ne!(revocation_element(&a, 1), revocation_element(&a, 2));
        assert_ne!(revocation_element(&a, 1), revocation_element(&b, 1));
        assert_eq!(revocation_element(&a, 1), revocation_element(&a, 1));
    }

    #[test]
    fn test_state_staleness() {
        let state = RevocationState {
            rev_reg_id: RevRegId::new("reg"),
            timestamp: 100,
            accumulator: G1Affine::generator(),
            issued: BTreeSet::new(),
            registry_updated_at: 150,
        };
        assert!(state.is_stale());
    }

    #[test]
    fn test_registry_validate_tails_length() {
        let def = RevocationRegistryDefinition {
            id: RevRegId::new("reg"),
            cred_def_id: CredDefId::new("cd"),
            max_cred_num: 2,
            q_tilde: G2Affine::generator(),
            tails: vec![G1Affine::generator(); 2],
        };
        assert!(def.validate().is_err());
        assert!(def.contains_index(2));
        assert!(!def.contains_index(0));
        assert!(!def.contains_index(3));
    }
}
