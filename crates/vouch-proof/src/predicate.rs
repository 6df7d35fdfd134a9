//! Predicate proofs on hidden integer attributes.
//!
//! For `m <op> k` the prover sets `δ = σ·m + t` (see
//! [`PredicateType::offset`]), which is non-negative exactly when the
//! predicate holds, and shows `δ ∈ [0, 2^32)`:
//!
//! - `C_m = g·m + h·r_m` is linked to the signature by sharing the response
//!   of `m` with the BBS+ proof;
//! - `C_j = g·b_j + h·r_j` commits to each bit of `δ`, with a CDS OR-proof
//!   that `b_j ∈ {0, 1}`;
//! - `r_m = σ·Σ 2^j·r_j`, so `Σ 2^j·C_j = σ·C_m + g·t` holds in the clear.

use ark_ec::{AffineRepr, CurveGroup};
use merlin::Transcript;
use serde::{Deserialize, Serialize};
use vouch_core::crypto::{
    self, ark_hex, hash_to_g1, int_scalar, random_scalar, Fr, G1Affine, G1Projective,
    TranscriptProtocol,
};
use zeroize::Zeroize;

use crate::error::{ProofError, ProofResult};
use crate::request::PredicateType;

/// Width of the non-negative difference `δ`.
pub const RANGE_BITS: usize = 32;

const PEDERSEN_DOMAIN: &[u8] = b"vouch/range-pedersen";

fn pedersen_bases() -> (G1Affine, G1Affine) {
    (
        hash_to_g1(PEDERSEN_DOMAIN, b"value"),
        hash_to_g1(PEDERSEN_DOMAIN, b"blinding"),
    )
}

fn power_of_two(j: usize) -> Fr {
    Fr::from(1u64 << j)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitProof {
    #[serde(with = "ark_hex")]
    pub commitment: G1Affine,
    #[serde(with = "ark_hex")]
    pub c0: Fr,
    #[serde(with = "ark_hex")]
    pub z0: Fr,
    #[serde(with = "ark_hex")]
    pub z1: Fr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    #[serde(with = "ark_hex")]
    pub c_m: G1Affine,
    #[serde(with = "ark_hex")]
    pub z_rm: Fr,
    pub bits: Vec<BitProof>,
}

/// Proof that `attr_name <p_type> p_value` holds inside one sub-proof.
///
/// `range` is absent when the attribute is revealed in the same sub-proof;
/// the verifier then evaluates the comparison on the disclosed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateProof {
    pub attr_name: String,
    pub p_type: PredicateType,
    pub p_value: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeProof>,
}

impl PredicateProof {
    pub fn matches(&self, attr_name: &str, p_type: PredicateType, p_value: i32) -> bool {
        self.attr_name == attr_name && self.p_type == p_type && self.p_value == p_value
    }
}

pub(crate) struct RangeCommitments {
    c_m: G1Affine,
    t_c: G1Affine,
    bits: Vec<(G1Affine, G1Affine, G1Affine)>,
}

pub(crate) fn append_statement(
    transcript: &mut Transcript,
    proof: &PredicateProof,
    range: Option<&RangeCommitments>,
) {
    transcript.append_message(b"predicate-attr", proof.attr_name.as_bytes());
    transcript.append_message(b"predicate-type", proof.p_type.as_str().as_bytes());
    transcript.append_message(b"predicate-value", &proof.p_value.to_le_bytes());
    if let Some(range) = range {
        transcript.append_point(b"C_m", &range.c_m);
        transcript.append_point(b"T_c", &range.t_c);
        for (commitment, t0, t1) in &range.bits {
            transcript.append_point(b"C_j", commitment);
            transcript.append_point(b"T0", t0);
            transcript.append_point(b"T1", t1);
        }
    }
}

struct BitWitness {
    bit: bool,
    commitment: G1Affine,
    blinding: Fr,
    nonce: Fr,
    /// Challenge and response of the simulated branch.
    sim_c: Fr,
    sim_z: Fr,
    t0: G1Affine,
    t1: G1Affine,
}

pub(crate) struct RangeProver {
    c_m: G1Affine,
    t_c: G1Affine,
    r_m: Fr,
    r_blind: Fr,
    bits: Vec<BitWitness>,
}

impl RangeProver {
    /// Commit to `value <p_type> bound`. `value_blind` is the blinding the
    /// BBS+ proof uses for the same attribute.
    pub(crate) fn commit(
        referent: &str,
        value: i32,
        p_type: PredicateType,
        bound: i32,
        value_blind: Fr,
    ) -> ProofResult<Self> {
        let (sigma, t) = p_type.offset(bound);
        let delta = sigma * value as i64 + t;
        if !(0..(1i64 << RANGE_BITS)).contains(&delta) {
            return Err(ProofError::PredicateNotSatisfied(referent.to_string()));
        }

        let (g, h) = pedersen_bases();
        let mut bits = Vec::with_capacity(RANGE_BITS);
        let mut weighted = Fr::from(0u64);
        for j in 0..RANGE_BITS {
            let bit = (delta >> j) & 1 == 1;
            let blinding = random_scalar();
            weighted += power_of_two(j) * blinding;

            let mut commitment: G1Projective = h * blinding;
            if bit {
                commitment += g;
            }
            let commitment = commitment.into_affine();

            let nonce = random_scalar();
            let sim_c = random_scalar();
            let sim_z = random_scalar();
            let real = (h * nonce).into_affine();
            let (t0, t1) = if bit {
                let simulated = h * sim_z - commitment * sim_c;
                (simulated.into_affine(), real)
            } else {
                let shifted = commitment.into_group() - g;
                let simulated = h * sim_z - shifted * sim_c;
                (real, simulated.into_affine())
            };
            bits.push(BitWitness {
                bit,
                commitment,
                blinding,
                nonce,
                sim_c,
                sim_z,
                t0,
                t1,
            });
        }

        let m = int_scalar(value as i64);
        let r_m = int_scalar(sigma) * weighted;
        let c_m = (g * m + h * r_m).into_affine();
        let r_blind = random_scalar();
        let t_c = (g * value_blind + h * r_blind).into_affine();

        Ok(Self {
            c_m,
            t_c,
            r_m,
            r_blind,
            bits,
        })
    }

    pub(crate) fn commitments(&self) -> RangeCommitments {
        RangeCommitments {
            c_m: self.c_m,
            t_c: self.t_c,
            bits: self
                .bits
                .iter()
                .map(|b| (b.commitment, b.t0, b.t1))
                .collect(),
        }
    }

    pub(crate) fn respond(&self, c: Fr) -> RangeProof {
        let bits = self
            .bits
            .iter()
            .map(|b| {
                let real_c = c - b.sim_c;
                let real_z = b.nonce + real_c * b.blinding;
                let (c0, z0, z1) = if b.bit {
                    (b.sim_c, b.sim_z, real_z)
                } else {
                    (real_c, real_z, b.sim_z)
                };
                BitProof {
                    commitment: b.commitment,
                    c0,
                    z0,
                    z1,
                }
            })
            .collect();
        RangeProof {
            c_m: self.c_m,
            z_rm: self.r_blind + c * self.r_m,
            bits,
        }
    }
}

impl Drop for RangeProver {
    fn drop(&mut self) {
        self.r_m.zeroize();
        self.r_blind.zeroize();
        for bit in &mut self.bits {
            bit.bit = false;
            bit.blinding.zeroize();
            bit.nonce.zeroize();
        }
    }
}

/// Recompute the commitments of a range proof. `z_m` is the BBS+ response
/// of the attribute. `Ok(None)` when the bit commitments do not recombine.
pub(crate) fn recompute(
    proof: &RangeProof,
    p_type: PredicateType,
    bound: i32,
    z_m: Fr,
    c: Fr,
) -> ProofResult<Option<RangeCommitments>> {
    if proof.bits.len() != RANGE_BITS {
        return Err(ProofError::MalformedPresentation(format!(
            "range proof has {} bits, expected {}",
            proof.bits.len(),
            RANGE_BITS
        )));
    }
    let (g, h) = pedersen_bases();
    let (sigma, t) = p_type.offset(bound);

    let recombined: G1Projective = proof
        .bits
        .iter()
        .enumerate()
        .map(|(j, b)| b.commitment * power_of_two(j))
        .sum();
    let shifted = proof.c_m * int_scalar(sigma) + g * int_scalar(t);
    if recombined != shifted {
        return Ok(None);
    }

    let t_c = (g * z_m + h * proof.z_rm - proof.c_m * c).into_affine();
    let bits = proof
        .bits
        .iter()
        .map(|b| {
            let c1 = c - b.c0;
            let t0 = h * b.z0 - b.commitment * b.c0;
            let t1 = h * b.z1 - (b.commitment.into_group() - g) * c1;
            (b.commitment, t0.into_affine(), t1.into_affine())
        })
        .collect();

    Ok(Some(RangeCommitments {
        c_m: proof.c_m,
        t_c,
        bits,
    }))
}

/// Evaluate a predicate on a disclosed encoded value.
pub(crate) fn holds_on_encoded(encoded: &str, p_type: PredicateType, bound: i32) -> bool {
    crypto::encoded_int(encoded).is_some_and(|v| p_type.holds(v, bound))
}
