use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use vouch_core::crypto::{ark_hex, Fr, G1Affine};
use vouch_core::{CredDefId, CredentialId, LinkSecretId, Nonce, RevRegId, SchemaId};
use vouch_vault::mime::MimeTypes;
use zeroize::Zeroize;

/// Issuer's offer to issue a credential under one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub issuer_id: String,
    #[serde(default)]
    pub nonce: Option<Nonce>,
}

/// Schnorr proof of knowledge of `(s', ms)` behind the blinded commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindingProof {
    #[serde(with = "ark_hex")]
    pub c: Fr,
    #[serde(with = "ark_hex")]
    pub z_s: Fr,
    #[serde(with = "ark_hex")]
    pub z_ms: Fr,
}

/// Holder's request, sent to the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub prover_did: String,
    pub cred_def_id: CredDefId,
    /// `U = h0·s' + h_link·ms`.
    #[serde(with = "ark_hex")]
    pub blinded_ms: G1Affine,
    pub blinded_ms_correctness_proof: BlindingProof,
    /// Fresh nonce the issued credential must echo.
    pub nonce: Nonce,
}

/// Holder-side state that pairs a request with its issued credential.
/// Consumed once by [`crate::materialize::store_credential`].
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRequestMetadata {
    #[serde(with = "ark_hex")]
    pub ms_blinding: Fr,
    pub nonce: Nonce,
    pub link_secret_id: LinkSecretId,
    pub cred_def_id: CredDefId,
}

impl fmt::Debug for CredentialRequestMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRequestMetadata")
            .field("ms_blinding", &"<redacted>")
            .field("nonce", &self.nonce)
            .field("link_secret_id", &self.link_secret_id)
            .field("cred_def_id", &self.cred_def_id)
            .finish()
    }
}

impl Zeroize for CredentialRequestMetadata {
    fn zeroize(&mut self) {
        self.ms_blinding.zeroize();
    }
}

impl Drop for CredentialRequestMetadata {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Raw value and its issuer-side encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub raw: String,
    pub encoded: String,
}

/// Partially blinded BBS+ signature `(A, e, s'')` as returned by the issuer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerSignature {
    #[serde(with = "ark_hex")]
    pub a: G1Affine,
    #[serde(with = "ark_hex")]
    pub e: Fr,
    #[serde(with = "ark_hex")]
    pub s_double_prime: Fr,
}

impl fmt::Debug for IssuerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuerSignature(<redacted>)")
    }
}

/// Credential data generated by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_index: Option<u32>,
    pub values: BTreeMap<String, AttributeValue>,
    pub signature: IssuerSignature,
    /// Echo of the request nonce.
    pub request_nonce: Nonce,
}

/// Caller options for storing a credential.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub mime_types: MimeTypes,
    pub credential_id: Option<CredentialId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::crypto::random_scalar;

    #[test]
    fn test_metadata_debug_redacts_blinding() {
        let meta = CredentialRequestMetadata {
            ms_blinding: random_scalar(),
            nonce: Nonce([1u8; 32]),
            link_secret_id: LinkSecretId::new("default"),
            cred_def_id: CredDefId::new("cd"),
        };
        let debug = format!("{:?}", meta);
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("default"));
    }

    #[test]
    fn test_metadata_zeroize_clears_blinding() {
        let mut meta = CredentialRequestMetadata {
            ms_blinding: random_scalar(),
            nonce: Nonce([2u8; 32]),
            link_secret_id: LinkSecretId::new("default"),
            cred_def_id: CredDefId::new("cd"),
        };
        meta.zeroize();
        assert_eq!(meta.ms_blinding, Fr::from(0u64));
        assert_eq!(meta.link_secret_id, LinkSecretId::new("default"));
    }

    #[test]
    fn test_offer_without_nonce_deserializes() {
        let offer: CredentialOffer = serde_json::from_str(
            r#"{"schema_id":"s","cred_def_id":"cd","issuer_id":"did:issuer"}"#,
        )
        .unwrap();
        assert!(offer.nonce.is_none());
    }
}
