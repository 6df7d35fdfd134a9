//! In-process issuer for tests.
//!
//! Generates definitions, offers, blind signatures and revocation
//! registries so holder operations can be exercised end to end. Registries
//! start with every index issued; only revocation shrinks the accumulator.

use std::collections::{BTreeMap, BTreeSet};

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, One, Zero};
use vouch_core::crypto::{self, random_scalar, Fr, G1Projective};
use vouch_core::{
    revocation_element, CredDefId, CredentialDefinition, CredentialId, CredentialPublicKey,
    Generators, Nonce, RevRegId, RevocationRegistryDefinition, RevocationState, Schema, SchemaId,
};

use crate::error::{CredError, CredResult};
use crate::request::verify_credential_request;
use crate::types::{
    AttributeValue, CredentialData, CredentialOffer, CredentialRequest, IssuerSignature,
};

pub struct TestIssuer {
    schema: Schema,
    cred_def: CredentialDefinition,
    secret: Fr,
}

impl TestIssuer {
    pub fn new(
        issuer_id: &str,
        schema_name: &str,
        attr_names: &[&str],
        supports_revocation: bool,
    ) -> Self {
        let attr_names: Vec<String> = attr_names.iter().map(|s| s.to_string()).collect();
        let schema = Schema {
            id: SchemaId::new(format!("{}:2:{}:1.0", issuer_id, schema_name)),
            name: schema_name.to_string(),
            version: "1.0".into(),
            issuer_id: issuer_id.to_string(),
            attr_names: attr_names.clone(),
        };
        let secret = random_scalar();
        let cred_def = CredentialDefinition {
            id: CredDefId::new(format!("{}:3:CL:{}:default", issuer_id, schema_name)),
            schema_id: schema.id.clone(),
            issuer_id: issuer_id.to_string(),
            tag: "default".into(),
            public_key: CredentialPublicKey {
                w: (Generators::g2() * secret).into_affine(),
                generator_seed: CredentialId::generate().to_string(),
                attr_names,
                supports_revocation,
            },
        };
        Self {
            schema,
            cred_def,
            secret,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn cred_def(&self) -> &CredentialDefinition {
        &self.cred_def
    }

    pub fn issuer_id(&self) -> &str {
        &self.cred_def.issuer_id
    }

    pub fn create_offer(&self) -> CredentialOffer {
        CredentialOffer {
            schema_id: self.schema.id.clone(),
            cred_def_id: self.cred_def.id.clone(),
            issuer_id: self.cred_def.issuer_id.clone(),
            nonce: Some(Nonce::generate()),
        }
    }

    /// Blindly sign `values` over the holder's committed link secret.
    pub fn issue(
        &self,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &[(&str, &str)],
        registry: Option<&mut RevocationRegistry>,
    ) -> CredResult<CredentialData> {
        verify_credential_request(request, offer, &self.cred_def)?;

        let values: BTreeMap<String, AttributeValue> = values
            .iter()
            .map(|(name, raw)| {
                (
                    name.to_string(),
                    AttributeValue {
                        raw: raw.to_string(),
                        encoded: crypto::encode_attribute(raw),
                    },
                )
            })
            .collect();
        let expected: BTreeSet<&String> = self.cred_def.public_key.attr_names.iter().collect();
        if values.keys().collect::<BTreeSet<_>>() != expected {
            return Err(CredError::InvalidRequest(
                "values do not match the definition's attributes".into(),
            ));
        }

        let (rev_reg_id, rev_index, rev_element) =
            match (self.cred_def.supports_revocation(), registry) {
                (true, Some(registry)) => {
                    let index = registry.allocate()?;
                    let id = registry.definition().id.clone();
                    let y = revocation_element(&id, index);
                    (Some(id), Some(index), y)
                }
                (true, None) => {
                    return Err(CredError::MissingRevocationInfo(
                        "revocable definition needs a registry".into(),
                    ))
                }
                (false, Some(_)) => {
                    return Err(CredError::InvalidRequest(
                        "definition does not support revocation".into(),
                    ))
                }
                (false, None) => (None, None, Fr::zero()),
            };

        let gens = self.cred_def.generators();
        let s_double_prime = random_scalar();
        let mut b: G1Projective = Generators::g1().into_group()
            + request.blinded_ms.into_group()
            + gens.h0 * s_double_prime
            + gens.h_rev * rev_element;
        for (name, value) in &values {
            b += gens.attr(name)? * crypto::attribute_scalar(&value.encoded);
        }

        let (e, inverse) = loop {
            let e = random_scalar();
            if let Some(inv) = (self.secret + e).inverse() {
                break (e, inv);
            }
        };
        let a = (b * inverse).into_affine();

        Ok(CredentialData {
            schema_id: self.schema.id.clone(),
            cred_def_id: self.cred_def.id.clone(),
            rev_reg_id,
            rev_index,
            values,
            signature: IssuerSignature {
                a,
                e,
                s_double_prime,
            },
            request_nonce: request.nonce.clone(),
        })
    }

    pub fn create_registry(&self, id: &str, max_cred_num: u32) -> RevocationRegistry {
        RevocationRegistry::new(RevRegId::new(id), self.cred_def.id.clone(), max_cred_num)
    }
}

/// Issuer-side revocation registry with its trapdoor `α`.
pub struct RevocationRegistry {
    definition: RevocationRegistryDefinition,
    alpha: Fr,
    issued: BTreeSet<u32>,
    next_index: u32,
    updated_at: u64,
}

impl RevocationRegistry {
    pub fn new(id: RevRegId, cred_def_id: CredDefId, max_cred_num: u32) -> Self {
        let alpha = random_scalar();
        let base = crypto::hash_to_g1(b"vouch/tails", id.as_str().as_bytes());
        let mut tails = Vec::with_capacity(max_cred_num as usize + 1);
        let mut power = Fr::one();
        for _ in 0..=max_cred_num {
            tails.push((base * power).into_affine());
            power *= alpha;
        }
        let definition = RevocationRegistryDefinition {
            id,
            cred_def_id,
            max_cred_num,
            q_tilde: (Generators::g2() * alpha).into_affine(),
            tails,
        };
        Self {
            definition,
            alpha,
            issued: (1..=max_cred_num).collect(),
            next_index: 1,
            updated_at: 0,
        }
    }

    pub fn definition(&self) -> &RevocationRegistryDefinition {
        &self.definition
    }

    pub fn allocate(&mut self) -> CredResult<u32> {
        if self.next_index > self.definition.max_cred_num {
            return Err(CredError::InvalidRequest("revocation registry is full".into()));
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(index)
    }

    /// Revoke `index` at time `at`. Returns false if it was not issued.
    pub fn revoke(&mut self, index: u32, at: u64) -> bool {
        let removed = self.issued.remove(&index);
        if removed {
            self.updated_at = self.updated_at.max(at);
        }
        removed
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Published state as observed at `timestamp`.
    pub fn state(&self, timestamp: u64) -> RevocationState {
        let mut exponent = Fr::one();
        for index in &self.issued {
            exponent *= self.alpha + revocation_element(&self.definition.id, *index);
        }
        RevocationState {
            rev_reg_id: self.definition.id.clone(),
            timestamp,
            accumulator: (self.definition.tails[0] * exponent).into_affine(),
            issued: self.issued.clone(),
            registry_updated_at: self.updated_at,
        }
    }
}
