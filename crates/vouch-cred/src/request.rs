//! Credential request construction.
//!
//! The holder blinds its link secret into `U = h0·s' + h_link·ms` and proves
//! knowledge of the opening with a Schnorr proof bound to the offer nonce,
//! the definition and the holder DID. The issuer signs over `U` without
//! learning `ms`.

use ark_ec::{AffineRepr, CurveGroup};
use merlin::Transcript;
use tracing::{debug, warn};
use vouch_core::crypto::{random_scalar, Fr, G1Affine, LinkSecret, TranscriptProtocol};
use vouch_core::{CredDefId, CredentialDefinition, Generators, LinkSecretId, Nonce};

use crate::error::{CredError, CredResult};
use crate::types::{BlindingProof, CredentialOffer, CredentialRequest, CredentialRequestMetadata};

/// Fiat–Shamir challenge of the blinding proof. Shared by prover and issuer.
pub(crate) fn blinding_challenge(
    cred_def_id: &CredDefId,
    prover_did: &str,
    offer_nonce: &Nonce,
    u: &G1Affine,
    t: &G1Affine,
) -> Fr {
    let mut transcript = Transcript::new(b"vouch-credential-request-v1");
    transcript.append_message(b"cred-def-id", cred_def_id.as_str().as_bytes());
    transcript.append_message(b"prover-did", prover_did.as_bytes());
    transcript.append_message(b"offer-nonce", offer_nonce.as_bytes());
    transcript.append_point(b"U", u);
    transcript.append_point(b"T", t);
    transcript.challenge_scalar(b"c")
}

fn check_offer(offer: &CredentialOffer, cred_def: &CredentialDefinition) -> CredResult<Nonce> {
    let nonce = offer
        .nonce
        .clone()
        .ok_or_else(|| CredError::InvalidOffer("offer carries no nonce".into()))?;
    if offer.cred_def_id != cred_def.id {
        return Err(CredError::InvalidOffer(format!(
            "offer is for {}, definition is {}",
            offer.cred_def_id, cred_def.id
        )));
    }
    if offer.schema_id != cred_def.schema_id {
        return Err(CredError::InvalidOffer(format!(
            "offer schema {} does not match definition schema {}",
            offer.schema_id, cred_def.schema_id
        )));
    }
    Ok(nonce)
}

/// Build a credential request and the metadata needed to store the
/// resulting credential.
pub fn create_credential_request(
    offer: &CredentialOffer,
    cred_def: &CredentialDefinition,
    holder_did: &str,
    link_secret: &LinkSecret,
    link_secret_id: &LinkSecretId,
) -> CredResult<(CredentialRequest, CredentialRequestMetadata)> {
    cred_def.validate()?;
    let offer_nonce = check_offer(offer, cred_def).inspect_err(|e| {
        warn!(cred_def_id = %cred_def.id, error = %e, "credential offer rejected");
    })?;
    if holder_did.trim().is_empty() {
        return Err(CredError::InvalidHolderDid);
    }

    let gens = cred_def.generators();
    let ms = link_secret.value();
    let s_prime = random_scalar();
    let u = (gens.h0 * s_prime + gens.h_link * ms).into_affine();

    let r_s = random_scalar();
    let r_ms = random_scalar();
    let t = (gens.h0 * r_s + gens.h_link * r_ms).into_affine();
    let c = blinding_challenge(&cred_def.id, holder_did, &offer_nonce, &u, &t);

    let proof = BlindingProof {
        c,
        z_s: r_s + c * s_prime,
        z_ms: r_ms + c * ms,
    };

    let request = CredentialRequest {
        prover_did: holder_did.to_string(),
        cred_def_id: cred_def.id.clone(),
        blinded_ms: u,
        blinded_ms_correctness_proof: proof,
        nonce: Nonce::generate(),
    };
    let metadata = CredentialRequestMetadata {
        ms_blinding: s_prime,
        nonce: request.nonce.clone(),
        link_secret_id: link_secret_id.clone(),
        cred_def_id: cred_def.id.clone(),
    };

    debug!(cred_def_id = %cred_def.id, "credential request created");
    Ok((request, metadata))
}

/// Issuer-side check of the blinding proof.
pub fn verify_credential_request(
    request: &CredentialRequest,
    offer: &CredentialOffer,
    cred_def: &CredentialDefinition,
) -> CredResult<()> {
    let offer_nonce = check_offer(offer, cred_def)?;
    if request.cred_def_id != cred_def.id {
        return Err(CredError::InvalidRequest("definition mismatch".into()));
    }
    if request.blinded_ms.is_zero() {
        return Err(CredError::InvalidRequest("blinded link secret is the identity".into()));
    }
    let gens: Generators = cred_def.generators();
    let proof = &request.blinded_ms_correctness_proof;
    let t = (gens.h0 * proof.z_s + gens.h_link * proof.z_ms
        - request.blinded_ms * proof.c)
        .into_affine();
    let c = blinding_challenge(
        &cred_def.id,
        &request.prover_did,
        &offer_nonce,
        &request.blinded_ms,
        &t,
    );
    if c != proof.c {
        return Err(CredError::InvalidRequest("blinding proof does not verify".into()));
    }
    Ok(())
}
