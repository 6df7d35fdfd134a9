//! Presentation verification.
//!
//! A presentation that does not answer the request it claims to answer is
//! an error. A presentation that answers it but whose proofs do not hold
//! yields `Ok(false)`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use vouch_core::crypto;

use crate::bbs_pok;
use crate::error::{ProofError, ProofResult};
use crate::predicate::{self, PredicateProof};
use crate::presentation::{self, PredicateStatement, Presentation, SubProofStatement};
use crate::request::{restrictions_satisfied, PresentationRequest};
use crate::revocation;
use crate::view::LedgerView;

fn malformed(msg: impl Into<String>) -> ProofError {
    ProofError::MalformedPresentation(msg.into())
}

fn rejected(reason: &str) -> ProofResult<bool> {
    warn!(reason, "presentation rejected");
    Ok(false)
}

/// Check the referent maps of the presentation against the request.
fn check_structure(presentation: &Presentation, request: &PresentationRequest) -> ProofResult<()> {
    let count = presentation.proof.sub_proofs.len();
    if presentation.identifiers.len() != count {
        return Err(malformed(format!(
            "{} identifiers for {} sub-proofs",
            presentation.identifiers.len(),
            count
        )));
    }

    let proof = &presentation.requested_proof;
    let mut answered: BTreeSet<&String> = BTreeSet::new();
    let attribute_answers = proof
        .revealed_attrs
        .keys()
        .chain(proof.unrevealed_attrs.keys())
        .chain(proof.self_attested_attrs.keys());
    for referent in attribute_answers {
        if !answered.insert(referent) {
            return Err(malformed(format!("referent {} answered twice", referent)));
        }
        if !request.requested_attributes.contains_key(referent) {
            return Err(malformed(format!("unknown referent {}", referent)));
        }
    }
    if answered.len() != request.requested_attributes.len() {
        return Err(malformed("attribute referents left unanswered"));
    }
    let predicates: BTreeSet<&String> = proof.predicates.keys().collect();
    let expected: BTreeSet<&String> = request.requested_predicates.keys().collect();
    if predicates != expected {
        return Err(malformed("predicate referents do not match the request"));
    }

    let indices = proof
        .revealed_attrs
        .values()
        .map(|a| a.sub_proof_index)
        .chain(proof.unrevealed_attrs.values().map(|r| r.sub_proof_index))
        .chain(proof.predicates.values().map(|r| r.sub_proof_index));
    for index in indices {
        if index >= count {
            return Err(malformed(format!("sub-proof index {} out of range", index)));
        }
    }

    for referent in proof.self_attested_attrs.keys() {
        let restricted = request
            .requested_attributes
            .get(referent)
            .is_some_and(|info| !info.restrictions.is_empty());
        if restricted {
            return Err(malformed(format!(
                "restricted referent {} is self-attested",
                referent
            )));
        }
    }
    Ok(())
}

/// Verify `presentation` as an answer to `request`.
pub fn verify_presentation(
    presentation: &Presentation,
    request: &PresentationRequest,
    ledger: &LedgerView,
) -> ProofResult<bool> {
    request.validate()?;
    check_structure(presentation, request)?;

    let sub_proofs = &presentation.proof.sub_proofs;
    let mut cred_defs = Vec::with_capacity(sub_proofs.len());
    let mut schemas = Vec::with_capacity(sub_proofs.len());
    for identifier in &presentation.identifiers {
        let cred_def = ledger.cred_def(&identifier.cred_def_id)?;
        let schema = ledger.schema(&identifier.schema_id)?;
        if cred_def.schema_id != schema.id {
            return Err(malformed(format!(
                "{} is not defined over {}",
                cred_def.id, schema.id
            )));
        }
        cred_defs.push(cred_def);
        schemas.push(schema);
    }

    // referent-level checks; intervals are collected per sub-proof
    let mut intervals: BTreeMap<usize, Vec<_>> = BTreeMap::new();
    let requested = &presentation.requested_proof;
    for (referent, revealed) in &requested.revealed_attrs {
        let info = request
            .requested_attributes
            .get(referent)
            .ok_or_else(|| malformed(format!("unknown referent {}", referent)))?;
        let i = revealed.sub_proof_index;
        if !restrictions_satisfied(&info.restrictions, schemas[i], cred_defs[i]) {
            return rejected("restriction not satisfied");
        }
        if sub_proofs[i].primary.revealed.get(&info.name) != Some(&revealed.encoded) {
            return rejected("revealed value not in sub-proof");
        }
        if crypto::encode_attribute(&revealed.raw) != revealed.encoded {
            return rejected("revealed value does not match its encoding");
        }
        intervals
            .entry(i)
            .or_default()
            .extend(request.attribute_interval(referent));
    }
    for (referent, reference) in &requested.unrevealed_attrs {
        let info = request
            .requested_attributes
            .get(referent)
            .ok_or_else(|| malformed(format!("unknown referent {}", referent)))?;
        let i = reference.sub_proof_index;
        if !restrictions_satisfied(&info.restrictions, schemas[i], cred_defs[i]) {
            return rejected("restriction not satisfied");
        }
        let primary = &sub_proofs[i].primary;
        if !primary.z_attrs.contains_key(&info.name) && !primary.revealed.contains_key(&info.name)
        {
            return rejected("unrevealed attribute not in sub-proof");
        }
        intervals
            .entry(i)
            .or_default()
            .extend(request.attribute_interval(referent));
    }
    for (referent, reference) in &requested.predicates {
        let info = request
            .requested_predicates
            .get(referent)
            .ok_or_else(|| malformed(format!("unknown referent {}", referent)))?;
        let i = reference.sub_proof_index;
        if !restrictions_satisfied(&info.restrictions, schemas[i], cred_defs[i]) {
            return rejected("restriction not satisfied");
        }
        let sub = &sub_proofs[i];
        let Some(proof) = sub
            .predicates
            .iter()
            .find(|p| p.matches(&info.name, info.p_type, info.p_value))
        else {
            return rejected("predicate proof missing");
        };
        if !predicate_covered(proof, &sub.primary.revealed, &sub.primary.z_attrs) {
            return rejected("predicate not proven");
        }
        intervals
            .entry(i)
            .or_default()
            .extend(request.predicate_interval(referent));
    }

    // the same link secret behind every sub-proof
    if let Some(first) = sub_proofs.first() {
        if sub_proofs
            .iter()
            .any(|s| s.primary.z_link != first.primary.z_link)
        {
            return rejected("link secret differs across sub-proofs");
        }
    }

    let c = presentation.proof.challenge;
    let mut transcript = presentation::new_transcript(&request.nonce, sub_proofs.len());
    for (i, sub) in sub_proofs.iter().enumerate() {
        let identifier = &presentation.identifiers[i];
        let cred_def = cred_defs[i];
        let gens = cred_def.generators();

        let w = &cred_def.public_key.w;
        let Some(pok) = bbs_pok::recompute(&sub.primary, &gens, w, c)? else {
            return rejected("signature proof does not verify");
        };

        let mut statements = Vec::with_capacity(sub.predicates.len());
        for proof in &sub.predicates {
            let range = match &proof.range {
                Some(range) => {
                    let Some(z_m) = sub.primary.z_attrs.get(&proof.attr_name) else {
                        return rejected("range proof over a revealed attribute");
                    };
                    match predicate::recompute(range, proof.p_type, proof.p_value, *z_m, c)? {
                        Some(commitments) => Some(commitments),
                        None => return rejected("range proof does not recombine"),
                    }
                }
                None => None,
            };
            statements.push(PredicateStatement { proof, range });
        }

        let non_revoc = match (cred_def.supports_revocation(), &sub.non_revoc) {
            (false, None) => None,
            (false, Some(_)) => {
                return Err(malformed(format!(
                    "{} does not support revocation",
                    cred_def.id
                )))
            }
            (true, None) => return rejected("non-revocation proof missing"),
            (true, Some(proof)) => {
                let (Some(rev_reg_id), Some(timestamp)) =
                    (&identifier.rev_reg_id, identifier.timestamp)
                else {
                    return rejected("non-revocation proof without registry coordinates");
                };
                let def = ledger.rev_reg_def(rev_reg_id)?;
                if def.cred_def_id != cred_def.id {
                    return rejected("registry belongs to another definition");
                }
                let state = ledger.rev_state(rev_reg_id)?;
                if state.timestamp != timestamp {
                    return rejected("accumulator timestamp mismatch");
                }
                let excluded = intervals
                    .get(&i)
                    .is_some_and(|ivs| ivs.iter().any(|iv| !iv.contains(timestamp)));
                if excluded {
                    return rejected("accumulator outside the requested interval");
                }
                match revocation::recompute(
                    proof,
                    def,
                    &state.accumulator,
                    sub.primary.z_rev,
                    c,
                ) {
                    Some(commitments) => Some(commitments),
                    None => return rejected("non-revocation proof does not verify"),
                }
            }
        };

        SubProofStatement {
            identifier,
            revealed: &sub.primary.revealed,
            pok,
            predicates: statements,
            non_revoc,
        }
        .append_to(&mut transcript);
    }

    if presentation::challenge(&mut transcript) != c {
        return rejected("challenge mismatch");
    }
    debug!(sub_proofs = sub_proofs.len(), "presentation verified");
    Ok(true)
}

/// A predicate is proven either by a range proof over a hidden attribute or
/// by the disclosed value itself.
fn predicate_covered(
    proof: &PredicateProof,
    revealed: &BTreeMap<String, String>,
    hidden: &BTreeMap<String, crypto::Fr>,
) -> bool {
    match &proof.range {
        Some(_) => hidden.contains_key(&proof.attr_name),
        None => revealed.get(&proof.attr_name).is_some_and(|encoded| {
            predicate::holds_on_encoded(encoded, proof.p_type, proof.p_value)
        }),
    }
}
