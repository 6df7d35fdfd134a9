//! Revocation adapter and accumulator membership proof.
//!
//! The accumulator of the non-revoked set `S` is `V = P·Π_{j∈S}(α + y_j)`.
//! A holder at index `i` derives its witness `W = P·Π_{j∈S\{i}}(α + y_j)`
//! from the public tails `P·α^k`, so that `e(W, Q̃ + g2·y_i) = e(V, g2)`.

use std::fmt;

use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{One, Zero};
use merlin::Transcript;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vouch_core::crypto::{
    ark_hex, random_scalar, Bn254, Fr, G1Affine, G1Projective, TranscriptProtocol,
};
use vouch_core::{
    revocation_element, Generators, RevRegId, RevocationRegistryDefinition, RevocationState,
};
use zeroize::Zeroize;

use crate::error::{ProofError, ProofResult};

/// Membership witness of one credential against one accumulator value.
#[derive(Clone)]
pub struct RevocationWitness {
    pub rev_reg_id: RevRegId,
    pub index: u32,
    pub element: Fr,
    pub witness: G1Affine,
    pub accumulator: G1Affine,
    pub timestamp: u64,
}

impl fmt::Debug for RevocationWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationWitness")
            .field("rev_reg_id", &self.rev_reg_id)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Coefficients of `Π (X + y)` over `roots`, lowest degree first.
fn polynomial_from_roots(roots: &[Fr]) -> Vec<Fr> {
    let mut coeffs = vec![Fr::one()];
    for y in roots {
        let mut next = vec![Fr::zero(); coeffs.len() + 1];
        for (k, c) in coeffs.iter().enumerate() {
            next[k] += *y * c;
            next[k + 1] += c;
        }
        coeffs = next;
    }
    coeffs
}

/// Derive the membership witness of `index` from a registry state.
pub fn witness_for(
    def: &RevocationRegistryDefinition,
    state: &RevocationState,
    index: u32,
) -> ProofResult<RevocationWitness> {
    if def.id != state.rev_reg_id {
        return Err(ProofError::InvalidRevocationState(format!(
            "state of {} applied to registry {}",
            state.rev_reg_id, def.id
        )));
    }
    def.validate()
        .map_err(|e| ProofError::InvalidRevocationState(e.to_string()))?;
    if !def.contains_index(index) {
        return Err(ProofError::InvalidRevocationState(format!(
            "index {} outside registry {}",
            index, def.id
        )));
    }
    if state.issued.iter().any(|j| !def.contains_index(*j)) {
        return Err(ProofError::InvalidRevocationState(format!(
            "issued set of {} exceeds the tails",
            def.id
        )));
    }
    if !state.issued.contains(&index) {
        return Err(ProofError::RevokedCredential(def.id.to_string()));
    }

    let roots: Vec<Fr> = state
        .issued
        .iter()
        .filter(|j| **j != index)
        .map(|j| revocation_element(&def.id, *j))
        .collect();
    let coeffs = polynomial_from_roots(&roots);
    let witness: G1Projective = coeffs
        .iter()
        .zip(def.tails.iter())
        .map(|(c, p)| *p * c)
        .sum();
    let witness = witness.into_affine();

    let element = revocation_element(&def.id, index);
    let shifted = (def.q_tilde.into_group() + Generators::g2() * element).into_affine();
    if Bn254::pairing(witness, shifted) != Bn254::pairing(state.accumulator, Generators::g2()) {
        return Err(ProofError::InvalidRevocationState(format!(
            "witness does not match the accumulator of {}",
            def.id
        )));
    }

    debug!(rev_reg_id = %def.id, timestamp = state.timestamp, "revocation witness derived");
    Ok(RevocationWitness {
        rev_reg_id: def.id.clone(),
        index,
        element,
        witness,
        accumulator: state.accumulator,
        timestamp: state.timestamp,
    })
}

// ---------------------------------------------------------------------------
// Membership proof
//
// W' = W·r, V̄ = V·r − W'·y. Then e(W', Q̃) = e(V̄, g2), and the prover shows
// knowledge of (r, y) with y sharing its response with the signed element.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevocProof {
    #[serde(with = "ark_hex")]
    pub w_prime: G1Affine,
    #[serde(with = "ark_hex")]
    pub v_bar: G1Affine,
    #[serde(with = "ark_hex")]
    pub z_r: Fr,
}

pub(crate) struct NonRevocCommitments {
    accumulator: G1Affine,
    w_prime: G1Affine,
    v_bar: G1Affine,
    t_acc: G1Affine,
}

impl NonRevocCommitments {
    pub(crate) fn append_to(&self, transcript: &mut Transcript) {
        transcript.append_point(b"V", &self.accumulator);
        transcript.append_point(b"W'", &self.w_prime);
        transcript.append_point(b"V-bar", &self.v_bar);
        transcript.append_point(b"T_acc", &self.t_acc);
    }
}

pub(crate) struct NonRevocProver {
    accumulator: G1Affine,
    w_prime: G1Affine,
    v_bar: G1Affine,
    t_acc: G1Affine,
    r: Fr,
    r_blind: Fr,
}

impl NonRevocProver {
    /// `rev_blind` is the blinding the BBS+ proof uses for the element.
    pub(crate) fn commit(witness: &RevocationWitness, rev_blind: Fr) -> Self {
        let r = loop {
            let r = random_scalar();
            if !r.is_zero() {
                break r;
            }
        };
        let r_blind = random_scalar();
        let w_prime = (witness.witness * r).into_affine();
        let v_bar = (witness.accumulator * r - w_prime * witness.element).into_affine();
        let t_acc = (witness.accumulator * r_blind - w_prime * rev_blind).into_affine();
        Self {
            accumulator: witness.accumulator,
            w_prime,
            v_bar,
            t_acc,
            r,
            r_blind,
        }
    }

    pub(crate) fn commitments(&self) -> NonRevocCommitments {
        NonRevocCommitments {
            accumulator: self.accumulator,
            w_prime: self.w_prime,
            v_bar: self.v_bar,
            t_acc: self.t_acc,
        }
    }

    pub(crate) fn respond(&self, c: Fr) -> NonRevocProof {
        NonRevocProof {
            w_prime: self.w_prime,
            v_bar: self.v_bar,
            z_r: self.r_blind + c * self.r,
        }
    }
}

impl Drop for NonRevocProver {
    fn drop(&mut self) {
        self.r.zeroize();
        self.r_blind.zeroize();
    }
}

/// Recompute the membership commitments. `z_rev` is the BBS+ response of
/// the revocation element. `None` when the pairing check fails.
pub(crate) fn recompute(
    proof: &NonRevocProof,
    def: &RevocationRegistryDefinition,
    accumulator: &G1Affine,
    z_rev: Fr,
    c: Fr,
) -> Option<NonRevocCommitments> {
    if proof.w_prime.is_zero() {
        return None;
    }
    let lhs = Bn254::pairing(proof.w_prime, def.q_tilde);
    if lhs != Bn254::pairing(proof.v_bar, Generators::g2()) {
        return None;
    }
    let t_acc =
        (*accumulator * proof.z_r - proof.w_prime * z_rev - proof.v_bar * c).into_affine();
    Some(NonRevocCommitments {
        accumulator: *accumulator,
        w_prime: proof.w_prime,
        v_bar: proof.v_bar,
        t_acc,
    })
}
