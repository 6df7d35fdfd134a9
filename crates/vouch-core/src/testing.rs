//! In-process signer for tests of crates that sit below the issuer.

use ark_ec::CurveGroup;
use ark_ff::Field;

use crate::crypto::{random_scalar, Fr, LinkSecret};
use crate::error::VouchResult;
use crate::ledger::{CredentialDefinition, CredentialPublicKey, Generators};
use crate::record::{CredentialRecord, CredentialSignature};
use crate::types::{CredDefId, SchemaId};

/// Holds an issuer secret and signs records directly, skipping the
/// blinded request round trip.
pub struct TestSigner {
    secret: Fr,
    cred_def: CredentialDefinition,
}

impl TestSigner {
    /// Definition `cred-def` over `schema`, issued by `issuer`.
    pub fn new(attr_names: &[&str]) -> Self {
        let secret = random_scalar();
        let cred_def = CredentialDefinition {
            id: CredDefId::new("cred-def"),
            schema_id: SchemaId::new("schema"),
            issuer_id: "issuer".into(),
            tag: "default".into(),
            public_key: CredentialPublicKey {
                w: (Generators::g2() * secret).into_affine(),
                generator_seed: "test-signer".into(),
                attr_names: attr_names.iter().map(|n| n.to_string()).collect(),
                supports_revocation: false,
            },
        };
        Self { secret, cred_def }
    }

    pub fn cred_def(&self) -> &CredentialDefinition {
        &self.cred_def
    }

    /// Replace the signature of `record` with a fresh one over its
    /// attributes and `link_secret`.
    pub fn sign(&self, record: &mut CredentialRecord, link_secret: &LinkSecret) -> VouchResult<()> {
        let s = random_scalar();
        let b = self.cred_def.generators().message_base(
            s,
            link_secret.value(),
            record.rev_element(),
            &record.attribute_scalars(),
        )?;
        let (e, inverse) = loop {
            let e = random_scalar();
            if let Some(inv) = (self.secret + e).inverse() {
                break (e, inv);
            }
        };
        record.signature = CredentialSignature {
            a: (b * inverse).into_affine(),
            e,
            s,
        };
        Ok(())
    }
}
