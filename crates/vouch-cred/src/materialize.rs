//! Turning issuer output into a stored credential.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};
use vouch_core::crypto::{self, LinkSecret};
use vouch_core::{
    AttributeEntry, CredentialDefinition, CredentialId, CredentialRecord, CredentialSignature,
    RevocationRegistryDefinition, StorageBackend,
};
use vouch_vault::{mime, CredentialStore, VerifiedRecord};

use crate::error::{CredError, CredResult};
use crate::types::{CredentialData, CredentialRequestMetadata, StoreOptions};

fn verification_failed(reason: &str) -> CredError {
    CredError::CredentialVerificationFailed(reason.to_string())
}

/// Check the revocation fields against the definition.
fn check_revocation(
    cred_def: &CredentialDefinition,
    data: &CredentialData,
    rev_reg_def: Option<&RevocationRegistryDefinition>,
) -> CredResult<()> {
    if !cred_def.supports_revocation() {
        if data.rev_reg_id.is_some() || data.rev_index.is_some() {
            return Err(verification_failed(
                "revocation info on a non-revocable credential",
            ));
        }
        return Ok(());
    }

    let rev_reg_id = data
        .rev_reg_id
        .as_ref()
        .ok_or_else(|| CredError::MissingRevocationInfo("credential has no registry id".into()))?;
    let index = data
        .rev_index
        .ok_or_else(|| CredError::MissingRevocationInfo("credential has no registry index".into()))?;
    let def = rev_reg_def.ok_or_else(|| {
        CredError::MissingRevocationInfo(format!("no definition supplied for {}", rev_reg_id))
    })?;

    def.validate()?;
    if &def.id != rev_reg_id || def.cred_def_id != cred_def.id {
        return Err(verification_failed("revocation registry mismatch"));
    }
    if !def.contains_index(index) {
        return Err(verification_failed("revocation index outside registry"));
    }
    Ok(())
}

/// Verify issuer output against the definition and request metadata, then
/// persist it. Returns the id of the stored credential.
pub fn store_credential<S: StorageBackend>(
    store: &CredentialStore<S>,
    cred_def: &CredentialDefinition,
    data: &CredentialData,
    metadata: &CredentialRequestMetadata,
    link_secret: &LinkSecret,
    options: &StoreOptions,
    rev_reg_def: Option<&RevocationRegistryDefinition>,
) -> CredResult<CredentialId> {
    cred_def.validate()?;
    let result = materialize(cred_def, data, metadata, link_secret, options, rev_reg_def);
    let verified = match result {
        Ok(verified) => verified,
        Err(e) => {
            warn!(cred_def_id = %cred_def.id, error = %e, "credential rejected");
            return Err(e);
        }
    };
    store.insert(&verified)?;
    let record = verified.into_record();
    info!(
        credential_id = %record.id,
        revocable = record.rev_reg_id.is_some(),
        "credential materialized"
    );
    Ok(record.id)
}

fn materialize(
    cred_def: &CredentialDefinition,
    data: &CredentialData,
    metadata: &CredentialRequestMetadata,
    link_secret: &LinkSecret,
    options: &StoreOptions,
    rev_reg_def: Option<&RevocationRegistryDefinition>,
) -> CredResult<VerifiedRecord> {
    if data.cred_def_id != cred_def.id || metadata.cred_def_id != cred_def.id {
        return Err(verification_failed("credential definition mismatch"));
    }
    if data.schema_id != cred_def.schema_id {
        return Err(verification_failed("schema mismatch"));
    }
    if data.request_nonce != metadata.nonce {
        return Err(verification_failed("credential answers a different request"));
    }
    check_revocation(cred_def, data, rev_reg_def)?;

    let expected: BTreeSet<&str> = cred_def
        .public_key
        .attr_names
        .iter()
        .map(String::as_str)
        .collect();
    let actual: BTreeSet<&str> = data.values.keys().map(String::as_str).collect();
    if expected != actual {
        return Err(verification_failed(
            "attribute set differs from the credential definition",
        ));
    }

    let mut attributes = BTreeMap::new();
    for (name, value) in &data.values {
        if crypto::encode_attribute(&value.raw) != value.encoded {
            return Err(CredError::CredentialVerificationFailed(format!(
                "encoding mismatch for {}",
                name
            )));
        }
        attributes.insert(
            name.clone(),
            AttributeEntry {
                raw: value.raw.clone(),
                encoded: value.encoded.clone(),
                mime_type: None,
            },
        );
    }

    let sig = &data.signature;
    let s = metadata.ms_blinding + sig.s_double_prime;
    mime::attach_mime_types(&mut attributes, &options.mime_types)?;

    let record = CredentialRecord {
        id: options
            .credential_id
            .clone()
            .unwrap_or_else(CredentialId::generate),
        schema_id: data.schema_id.clone(),
        cred_def_id: cred_def.id.clone(),
        issuer_id: cred_def.issuer_id.clone(),
        attributes,
        signature: CredentialSignature {
            a: sig.a,
            e: sig.e,
            s,
        },
        rev_reg_id: data.rev_reg_id.clone(),
        rev_index: data.rev_index,
        link_secret_id: metadata.link_secret_id.clone(),
    };
    Ok(VerifiedRecord::check(record, cred_def, link_secret)?)
}
