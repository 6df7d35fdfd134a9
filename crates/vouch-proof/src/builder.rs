//! Presentation construction.
//!
//! Referents are grouped by the credential that answers them; each distinct
//! credential yields one sub-proof. All sub-proofs are committed first, then
//! answered under a single challenge, with the link secret sharing one
//! blinding across every sub-proof.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};
use vouch_core::crypto::{self, random_scalar, LinkSecret};
use vouch_core::{CredentialDefinition, CredentialId, CredentialRecord, CredentialSource};

use crate::bbs_pok::BbsProver;
use crate::error::{ProofError, ProofResult};
use crate::predicate::{PredicateProof, RangeProver};
use crate::presentation::{
    self, AggregatedProof, Identifier, PredicateStatement, Presentation, RequestedProof,
    RevealedAttribute, SubProof, SubProofReference, SubProofStatement,
};
use crate::request::{
    restrictions_satisfied, NonRevokedInterval, PredicateType, PresentationRequest,
    RequestedCredentials,
};
use crate::revocation::{self, NonRevocProver, RevocationWitness};
use crate::view::LedgerView;

struct PlannedPredicate {
    attr_name: String,
    p_type: PredicateType,
    p_value: i32,
    referent: String,
}

/// Everything known about one credential before proving.
struct CredentialPlan<'a> {
    record: CredentialRecord,
    cred_def: &'a CredentialDefinition,
    revealed: BTreeSet<String>,
    predicates: Vec<PlannedPredicate>,
    intervals: Vec<NonRevokedInterval>,
    witness: Option<RevocationWitness>,
    identifier: Identifier,
}

/// Build a presentation answering `request` with the chosen credentials.
///
/// The store behind `source` is only read. Every credential is copied out
/// before any proof is computed.
pub fn create_presentation(
    request: &PresentationRequest,
    requested: &RequestedCredentials,
    ledger: &LedgerView,
    link_secret: &LinkSecret,
    source: &dyn CredentialSource,
) -> ProofResult<Presentation> {
    request.validate()?;
    requested.check_coverage(request)?;

    let result = build(request, requested, ledger, link_secret, source);
    if let Err(e) = &result {
        warn!(request = %request.name, error = %e, "presentation not created");
    }
    result
}

fn build(
    request: &PresentationRequest,
    requested: &RequestedCredentials,
    ledger: &LedgerView,
    link_secret: &LinkSecret,
    source: &dyn CredentialSource,
) -> ProofResult<Presentation> {
    let mut plans = Vec::new();
    let mut index_of: BTreeMap<CredentialId, usize> = BTreeMap::new();
    for id in requested.credential_ids() {
        let record = source
            .credential(&id)?
            .ok_or_else(|| ProofError::CredentialNotFound(id.to_string()))?;
        let cred_def = ledger.cred_def(&record.cred_def_id)?;
        ledger.schema(&record.schema_id)?;
        cred_def.validate()?;
        if !record.signature_verifies(cred_def, link_secret.value()) {
            return Err(ProofError::UnboundCredential(id.to_string()));
        }
        index_of.insert(id, plans.len());
        plans.push(CredentialPlan {
            identifier: Identifier {
                schema_id: record.schema_id.clone(),
                cred_def_id: record.cred_def_id.clone(),
                rev_reg_id: None,
                timestamp: None,
            },
            record,
            cred_def,
            revealed: BTreeSet::new(),
            predicates: Vec::new(),
            intervals: Vec::new(),
            witness: None,
        });
    }

    let mut requested_proof = RequestedProof {
        self_attested_attrs: requested.self_attested_attributes.clone(),
        ..Default::default()
    };

    for (referent, choice) in &requested.requested_attributes {
        let info = request
            .requested_attributes
            .get(referent)
            .ok_or_else(|| ProofError::UnknownReferent(referent.clone()))?;
        let index = sub_proof_index(&index_of, &choice.cred_id)?;
        let plan = &mut plans[index];
        let entry = plan.record.attribute(&info.name).ok_or_else(|| {
            ProofError::AttributeNotInCredential {
                credential: choice.cred_id.to_string(),
                attribute: info.name.clone(),
            }
        })?;
        let schema = ledger.schema(&plan.record.schema_id)?;
        if !restrictions_satisfied(&info.restrictions, schema, plan.cred_def) {
            return Err(ProofError::RestrictionNotSatisfied(referent.clone()));
        }
        if choice.revealed {
            requested_proof.revealed_attrs.insert(
                referent.clone(),
                RevealedAttribute {
                    sub_proof_index: index,
                    raw: entry.raw.clone(),
                    encoded: entry.encoded.clone(),
                },
            );
            plan.revealed.insert(info.name.clone());
        } else {
            requested_proof.unrevealed_attrs.insert(
                referent.clone(),
                SubProofReference {
                    sub_proof_index: index,
                },
            );
        }
        if let Some(interval) = request.attribute_interval(referent) {
            plan.intervals.push(interval);
        }
    }

    for (referent, choice) in &requested.requested_predicates {
        let info = request
            .requested_predicates
            .get(referent)
            .ok_or_else(|| ProofError::UnknownReferent(referent.clone()))?;
        let index = sub_proof_index(&index_of, &choice.cred_id)?;
        let plan = &mut plans[index];
        let entry = plan.record.attribute(&info.name).ok_or_else(|| {
            ProofError::AttributeNotInCredential {
                credential: choice.cred_id.to_string(),
                attribute: info.name.clone(),
            }
        })?;
        let schema = ledger.schema(&plan.record.schema_id)?;
        if !restrictions_satisfied(&info.restrictions, schema, plan.cred_def) {
            return Err(ProofError::RestrictionNotSatisfied(referent.clone()));
        }
        let value = crypto::encoded_int(&entry.encoded)
            .ok_or_else(|| ProofError::PredicateNotSatisfied(referent.clone()))?;
        if !info.p_type.holds(value, info.p_value) {
            return Err(ProofError::PredicateNotSatisfied(referent.clone()));
        }
        requested_proof.predicates.insert(
            referent.clone(),
            SubProofReference {
                sub_proof_index: index,
            },
        );
        let duplicate = plan.predicates.iter().any(|p| {
            p.attr_name == info.name && p.p_type == info.p_type && p.p_value == info.p_value
        });
        if !duplicate {
            plan.predicates.push(PlannedPredicate {
                attr_name: info.name.clone(),
                p_type: info.p_type,
                p_value: info.p_value,
                referent: referent.clone(),
            });
        }
        if let Some(interval) = request.predicate_interval(referent) {
            plan.intervals.push(interval);
        }
    }

    for plan in &mut plans {
        if plan.cred_def.supports_revocation() {
            attach_revocation(plan, ledger)?;
        }
    }

    debug!(
        sub_proofs = plans.len(),
        referents = request.requested_attributes.len() + request.requested_predicates.len(),
        "referents grouped by credential"
    );

    prove(request, plans, requested_proof, link_secret)
}

fn sub_proof_index(
    index_of: &BTreeMap<CredentialId, usize>,
    id: &CredentialId,
) -> ProofResult<usize> {
    index_of
        .get(id)
        .copied()
        .ok_or_else(|| ProofError::CredentialNotFound(id.to_string()))
}

fn attach_revocation(plan: &mut CredentialPlan<'_>, ledger: &LedgerView) -> ProofResult<()> {
    let (rev_reg_id, index) = match (&plan.record.rev_reg_id, plan.record.rev_index) {
        (Some(id), Some(index)) => (id.clone(), index),
        _ => {
            return Err(ProofError::InvalidRevocationState(format!(
                "credential {} has no registry index",
                plan.record.id
            )))
        }
    };
    let def = ledger.rev_reg_def(&rev_reg_id)?;
    if def.cred_def_id != plan.cred_def.id {
        return Err(ProofError::InvalidRevocationState(format!(
            "registry {} belongs to {}",
            rev_reg_id, def.cred_def_id
        )));
    }
    let state = ledger.rev_state(&rev_reg_id)?;
    if state.is_stale() {
        return Err(ProofError::StaleRevocationState(rev_reg_id.to_string()));
    }
    if plan.intervals.iter().any(|i| !i.contains(state.timestamp)) {
        return Err(ProofError::StaleRevocationState(rev_reg_id.to_string()));
    }
    let witness = revocation::witness_for(def, state, index)?;

    plan.identifier.rev_reg_id = Some(rev_reg_id);
    plan.identifier.timestamp = Some(state.timestamp);
    plan.witness = Some(witness);
    Ok(())
}

/// Provers of one sub-proof, held between commitment and response.
struct SubProver {
    pok: BbsProver,
    ranges: Vec<(PredicateProof, Option<RangeProver>)>,
    non_revoc: Option<NonRevocProver>,
}

fn prove(
    request: &PresentationRequest,
    plans: Vec<CredentialPlan<'_>>,
    requested_proof: RequestedProof,
    link_secret: &LinkSecret,
) -> ProofResult<Presentation> {
    let link_blind = random_scalar();
    let mut transcript = presentation::new_transcript(&request.nonce, plans.len());
    let mut provers = Vec::with_capacity(plans.len());

    for plan in &plans {
        let gens = plan.cred_def.generators();
        let pok = BbsProver::commit(
            &plan.record,
            &gens,
            link_secret.value(),
            &plan.revealed,
            link_blind,
        )?;

        let mut ranges = Vec::with_capacity(plan.predicates.len());
        for p in &plan.predicates {
            let header = PredicateProof {
                attr_name: p.attr_name.clone(),
                p_type: p.p_type,
                p_value: p.p_value,
                range: None,
            };
            let prover = match pok.attr_blind(&p.attr_name) {
                Some(blind) => {
                    let value = plan
                        .record
                        .attribute(&p.attr_name)
                        .and_then(|entry| crypto::encoded_int(&entry.encoded))
                        .ok_or_else(|| ProofError::PredicateNotSatisfied(p.referent.clone()))?;
                    Some(RangeProver::commit(
                        &p.referent,
                        value,
                        p.p_type,
                        p.p_value,
                        blind,
                    )?)
                }
                // revealed in this sub-proof
                None => None,
            };
            ranges.push((header, prover));
        }

        let non_revoc = plan
            .witness
            .as_ref()
            .map(|w| NonRevocProver::commit(w, pok.rev_blind()));

        SubProofStatement {
            identifier: &plan.identifier,
            revealed: pok.revealed(),
            pok: pok.commitments(),
            predicates: ranges
                .iter()
                .map(|(proof, prover)| PredicateStatement {
                    proof,
                    range: prover.as_ref().map(RangeProver::commitments),
                })
                .collect(),
            non_revoc: non_revoc.as_ref().map(NonRevocProver::commitments),
        }
        .append_to(&mut transcript);

        provers.push(SubProver {
            pok,
            ranges,
            non_revoc,
        });
    }

    let c = presentation::challenge(&mut transcript);
    let sub_proofs: Vec<SubProof> = provers
        .iter()
        .map(|sub| SubProof {
            primary: sub.pok.respond(c),
            predicates: sub
                .ranges
                .iter()
                .map(|(header, prover)| PredicateProof {
                    range: prover.as_ref().map(|p| p.respond(c)),
                    ..header.clone()
                })
                .collect(),
            non_revoc: sub.non_revoc.as_ref().map(|p| p.respond(c)),
        })
        .collect();

    let identifiers = plans.into_iter().map(|p| p.identifier).collect();
    info!(
        request = %request.name,
        sub_proofs = sub_proofs.len(),
        revealed = requested_proof.revealed_attrs.len(),
        predicates = requested_proof.predicates.len(),
        "presentation created"
    );
    Ok(Presentation {
        proof: AggregatedProof {
            challenge: c,
            sub_proofs,
        },
        requested_proof,
        identifiers,
    })
}
