use std::collections::{BTreeMap, BTreeSet};

use ark_ec::pairing::Pairing;
use ark_ec::AffineRepr;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, ark_hex, Bn254, Fr, G1Affine};
use crate::ledger::{revocation_element, CredentialDefinition, Generators};
use crate::types::{CredDefId, CredentialId, LinkSecretId, RevRegId, SchemaId};

/// One attribute as stored: the raw value, its canonical encoding and an
/// optional MIME type recorded at materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub raw: String,
    pub encoded: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Unblinded BBS+ signature `(A, e, s)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSignature {
    #[serde(with = "ark_hex")]
    pub a: G1Affine,
    #[serde(with = "ark_hex")]
    pub e: Fr,
    #[serde(with = "ark_hex")]
    pub s: Fr,
}

impl std::fmt::Debug for CredentialSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialSignature(<redacted>)")
    }
}

/// A credential as persisted by the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub issuer_id: String,
    pub attributes: BTreeMap<String, AttributeEntry>,
    pub signature: CredentialSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_index: Option<u32>,
    pub link_secret_id: LinkSecretId,
}

impl CredentialRecord {
    pub fn attribute(&self, name: &str) -> Option<&AttributeEntry> {
        self.attributes.get(name)
    }

    /// MIME type of one attribute. `None` when the attribute is unknown or
    /// has no MIME type recorded.
    pub fn mime_type(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|entry| entry.mime_type.as_deref())
    }

    /// Every recorded MIME type. Attributes without one are absent.
    pub fn mime_types(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .mime_type
                    .as_ref()
                    .map(|mime| (name.clone(), mime.clone()))
            })
            .collect()
    }

    /// Signed attribute messages keyed by name.
    pub fn attribute_scalars(&self) -> BTreeMap<String, Fr> {
        self.attributes
            .iter()
            .map(|(name, entry)| (name.clone(), crypto::attribute_scalar(&entry.encoded)))
            .collect()
    }

    /// Signed revocation element, zero for non-revocable credentials.
    pub fn rev_element(&self) -> Fr {
        match (&self.rev_reg_id, self.rev_index) {
            (Some(reg), Some(index)) => revocation_element(reg, index),
            _ => Fr::zero(),
        }
    }

    /// Check the signature `e(A, w + g2·e) = e(B, g2)` against `cred_def`,
    /// with `link_secret` as the hidden link-secret message.
    ///
    /// A record bound to another link secret, or carrying attributes the
    /// definition does not sign, does not verify.
    pub fn signature_verifies(&self, cred_def: &CredentialDefinition, link_secret: Fr) -> bool {
        if self.cred_def_id != cred_def.id
            || self.schema_id != cred_def.schema_id
            || self.signature.a.is_zero()
        {
            return false;
        }
        let signed: BTreeSet<&str> = self.attributes.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = cred_def
            .public_key
            .attr_names
            .iter()
            .map(String::as_str)
            .collect();
        if signed != expected {
            return false;
        }

        let gens = cred_def.generators();
        let b = match gens.message_base(
            self.signature.s,
            link_secret,
            self.rev_element(),
            &self.attribute_scalars(),
        ) {
            Ok(b) => b,
            Err(_) => return false,
        };
        let lhs = Bn254::pairing(
            self.signature.a,
            cred_def.public_key.w.into_group() + Generators::g2() * self.signature.e,
        );
        lhs == Bn254::pairing(b, Generators::g2())
    }

    /// Public view without signature material.
    pub fn info(&self) -> CredentialInfo {
        CredentialInfo {
            referent: self.id.clone(),
            attrs: self
                .attributes
                .iter()
                .map(|(name, entry)| (name.clone(), entry.raw.clone()))
                .collect(),
            schema_id: self.schema_id.clone(),
            cred_def_id: self.cred_def_id.clone(),
            rev_reg_id: self.rev_reg_id.clone(),
            cred_rev_id: self.rev_index,
        }
    }
}

/// Credential summary suitable for display and matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub referent: CredentialId,
    pub attrs: BTreeMap<String, String>,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub rev_reg_id: Option<RevRegId>,
    pub cred_rev_id: Option<u32>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::{encode_attribute, LinkSecret};
    use crate::testing::TestSigner;

    pub(crate) fn sample_record() -> CredentialRecord {
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
            id: CredentialId::new("cred-1"),
            schema_id: SchemaId::new("schema"),
            cred_def_id: CredDefId::new("cred-def"),
            issuer_id: "issuer".into(),
            attributes,
            signature: CredentialSignature {
                a: G1Affine::generator(),
                e: Fr::from(5u64),
                s: Fr::from(9u64),
            },
            rev_reg_id: None,
            rev_index: None,
            link_secret_id: LinkSecretId::new("default"),
        }
    }

    #[test]
    fn test_mime_lookup() {
        let record = sample_record();
        assert_eq!(record.mime_type("name"), Some("text/plain"));
        assert_eq!(record.mime_type("age"), None);
        assert_eq!(record.mime_type("unknown"), None);
        let all = record.mime_types();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("name").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn test_rev_element_zero_without_registry() {
        let record = sample_record();
        assert!(record.rev_element().is_zero());
        let mut revocable = record.clone();
        revocable.rev_reg_id = Some(RevRegId::new("reg"));
        revocable.rev_index = Some(3);
        assert_eq!(
            revocable.rev_element(),
            revocation_element(&RevRegId::new("reg"), 3)
        );
    }

    #[test]
    fn test_record_serde_and_redacted_signature() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: CredentialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(format!("{:?}", record).contains("<redacted>"));
    }

    #[test]
    fn test_signature_bound_to_link_secret() {
        let signer = TestSigner::new(&["name", "age"]);
        let secret = LinkSecret::generate();
        let mut record = sample_record();
        signer.sign(&mut record, &secret).unwrap();
        assert!(record.signature_verifies(signer.cred_def(), secret.value()));

        let other = LinkSecret::generate();
        assert!(!record.signature_verifies(signer.cred_def(), other.value()));
    }

    #[test]
    fn test_signature_rejects_altered_record() {
        let signer = TestSigner::new(&["name", "age"]);
        let secret = LinkSecret::generate();
        let mut record = sample_record();
        signer.sign(&mut record, &secret).unwrap();

        let mut changed = record.clone();
        changed.attributes.get_mut("age").unwrap().encoded = encode_attribute("31");
        assert!(!changed.signature_verifies(signer.cred_def(), secret.value()));

        let mut extra = record.clone();
        extra.attributes.insert(
            "photo".into(),
            AttributeEntry {
                raw: "x".into(),
                encoded: encode_attribute("x"),
                mime_type: None,
            },
        );
        assert!(!extra.signature_verifies(signer.cred_def(), secret.value()));

        // MIME entries are not signed
        let mut retyped = record.clone();
        retyped.attributes.get_mut("age").unwrap().mime_type = Some("text/plain".into());
        assert!(retyped.signature_verifies(signer.cred_def(), secret.value()));
    }

    #[test]
    fn test_info_has_raw_values() {
        let info = sample_record().info();
        assert_eq!(info.attrs.get("name").map(String::as_str), Some("Alice"));
        assert_eq!(info.cred_rev_id, None);
    }
}
