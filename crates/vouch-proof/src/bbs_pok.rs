//! Randomized proof of knowledge of a BBS+ signature.
//!
//! The holder re-randomizes `(A, e, s)` into `A' = A·r1`, `Ā = A'·(−e) + B·r1`
//! and `d = B·r1 − h0·r2`, then proves two linear relations:
//!
//! ```text
//! Ā − d                        = A'·(−e) + h0·r2
//! g1 + Σ_revealed h_i·m_i      = d·r3 − h0·s' − Σ_hidden h_i·m_i
//! ```
//!
//! with `r3 = 1/r1` and `s' = s − r2·r3`. The verifier checks
//! `e(A', w) = e(Ā, g2)`. Commitments are not shipped; the verifier
//! recomputes them from the responses and the shared challenge.

use std::collections::{BTreeMap, BTreeSet};

use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, Zero};
use merlin::Transcript;
use serde::{Deserialize, Serialize};
use vouch_core::crypto::{
    self, ark_hex, ark_hex_map, random_scalar, Bn254, Fr, G1Affine, G1Projective, G2Affine,
    TranscriptProtocol,
};
use vouch_core::{CredentialRecord, Generators};
use zeroize::Zeroize;

use crate::error::{ProofError, ProofResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BbsProof {
    #[serde(with = "ark_hex")]
    pub a_prime: G1Affine,
    #[serde(with = "ark_hex")]
    pub a_bar: G1Affine,
    #[serde(with = "ark_hex")]
    pub d: G1Affine,
    #[serde(with = "ark_hex")]
    pub z_e: Fr,
    #[serde(with = "ark_hex")]
    pub z_r2: Fr,
    #[serde(with = "ark_hex")]
    pub z_r3: Fr,
    #[serde(with = "ark_hex")]
    pub z_s: Fr,
    /// Link-secret response. Equal across sub-proofs of one presentation.
    #[serde(with = "ark_hex")]
    pub z_link: Fr,
    #[serde(with = "ark_hex")]
    pub z_rev: Fr,
    /// Responses for hidden attributes.
    #[serde(with = "ark_hex_map")]
    pub z_attrs: BTreeMap<String, Fr>,
    /// Revealed attributes, name to encoded value.
    pub revealed: BTreeMap<String, String>,
}

/// `(A', Ā, d, T1, T2)` as they enter the transcript.
pub(crate) struct PokCommitments {
    a_prime: G1Affine,
    a_bar: G1Affine,
    d: G1Affine,
    t1: G1Affine,
    t2: G1Affine,
}

impl PokCommitments {
    pub(crate) fn append_to(&self, transcript: &mut Transcript) {
        transcript.append_point(b"A'", &self.a_prime);
        transcript.append_point(b"A-bar", &self.a_bar);
        transcript.append_point(b"d", &self.d);
        transcript.append_point(b"T1", &self.t1);
        transcript.append_point(b"T2", &self.t2);
    }
}

/// Prover state between commitment and response.
pub(crate) struct BbsProver {
    a_prime: G1Affine,
    a_bar: G1Affine,
    d: G1Affine,
    t1: G1Affine,
    t2: G1Affine,
    revealed: BTreeMap<String, String>,
    e: Fr,
    r2: Fr,
    r3: Fr,
    s_prime: Fr,
    link: Fr,
    rev: Fr,
    hidden: BTreeMap<String, Fr>,
    e_blind: Fr,
    r2_blind: Fr,
    r3_blind: Fr,
    s_blind: Fr,
    link_blind: Fr,
    rev_blind: Fr,
    hidden_blind: BTreeMap<String, Fr>,
}

impl BbsProver {
    /// Randomize the stored signature and commit to the hidden messages.
    /// `link_blind` must be the same for every credential of a presentation.
    pub(crate) fn commit(
        record: &CredentialRecord,
        gens: &Generators,
        link_secret: Fr,
        revealed_names: &BTreeSet<String>,
        link_blind: Fr,
    ) -> ProofResult<Self> {
        let messages = record.attribute_scalars();
        let rev = record.rev_element();
        let sig = &record.signature;
        let b = gens.message_base(sig.s, link_secret, rev, &messages)?;

        let r1 = nonzero_scalar();
        let r2 = random_scalar();
        let r3 = r1
            .inverse()
            .ok_or_else(|| ProofError::Internal("randomizer has no inverse".into()))?;

        let b_r1 = b * r1;
        let a_prime = (sig.a * r1).into_affine();
        let a_bar = (a_prime * (-sig.e) + b_r1).into_affine();
        let d = (b_r1 - gens.h0 * r2).into_affine();
        let s_prime = sig.s - r2 * r3;

        let mut revealed = BTreeMap::new();
        let mut hidden = BTreeMap::new();
        let mut hidden_blind = BTreeMap::new();
        for (name, value) in messages {
            if revealed_names.contains(&name) {
                if let Some(entry) = record.attribute(&name) {
                    revealed.insert(name, entry.encoded.clone());
                }
            } else {
                hidden_blind.insert(name.clone(), random_scalar());
                hidden.insert(name, value);
            }
        }

        let e_blind = random_scalar();
        let r2_blind = random_scalar();
        let r3_blind = random_scalar();
        let s_blind = random_scalar();
        let rev_blind = random_scalar();

        let t1 = (a_prime * (-e_blind) + gens.h0 * r2_blind).into_affine();
        let mut t2: G1Projective =
            d * r3_blind - gens.h0 * s_blind - gens.h_link * link_blind - gens.h_rev * rev_blind;
        for (name, blind) in &hidden_blind {
            t2 -= gens.attr(name)? * *blind;
        }

        Ok(Self {
            a_prime,
            a_bar,
            d,
            t1,
            t2: t2.into_affine(),
            revealed,
            e: sig.e,
            r2,
            r3,
            s_prime,
            link: link_secret,
            rev,
            hidden,
            e_blind,
            r2_blind,
            r3_blind,
            s_blind,
            link_blind,
            rev_blind,
            hidden_blind,
        })
    }

    pub(crate) fn commitments(&self) -> PokCommitments {
        PokCommitments {
            a_prime: self.a_prime,
            a_bar: self.a_bar,
            d: self.d,
            t1: self.t1,
            t2: self.t2,
        }
    }

    pub(crate) fn revealed(&self) -> &BTreeMap<String, String> {
        &self.revealed
    }

    /// Blinding of a hidden attribute, for proofs that must share its response.
    pub(crate) fn attr_blind(&self, name: &str) -> Option<Fr> {
        self.hidden_blind.get(name).copied()
    }

    pub(crate) fn rev_blind(&self) -> Fr {
        self.rev_blind
    }

    pub(crate) fn respond(&self, c: Fr) -> BbsProof {
        let z_attrs = self
            .hidden
            .iter()
            .map(|(name, m)| {
                let blind = self.hidden_blind.get(name).copied().unwrap_or_default();
                (name.clone(), blind + c * m)
            })
            .collect();
        BbsProof {
            a_prime: self.a_prime,
            a_bar: self.a_bar,
            d: self.d,
            z_e: self.e_blind + c * self.e,
            z_r2: self.r2_blind + c * self.r2,
            z_r3: self.r3_blind + c * self.r3,
            z_s: self.s_blind + c * self.s_prime,
            z_link: self.link_blind + c * self.link,
            z_rev: self.rev_blind + c * self.rev,
            z_attrs,
            revealed: self.revealed.clone(),
        }
    }
}

impl Drop for BbsProver {
    fn drop(&mut self) {
        for secret in [
            &mut self.e,
            &mut self.r2,
            &mut self.r3,
            &mut self.s_prime,
            &mut self.link,
            &mut self.rev,
            &mut self.e_blind,
            &mut self.r2_blind,
            &mut self.r3_blind,
            &mut self.s_blind,
            &mut self.link_blind,
            &mut self.rev_blind,
        ] {
            secret.zeroize();
        }
        for value in self.hidden.values_mut().chain(self.hidden_blind.values_mut()) {
            value.zeroize();
        }
    }
}

fn nonzero_scalar() -> Fr {
    loop {
        let r = random_scalar();
        if !r.is_zero() {
            return r;
        }
    }
}

/// Recompute the commitments from a proof. `Ok(None)` when the pairing
/// check fails; an error when the proof does not fit the definition.
pub(crate) fn recompute(
    proof: &BbsProof,
    gens: &Generators,
    w: &G2Affine,
    c: Fr,
) -> ProofResult<Option<PokCommitments>> {
    let covered: BTreeSet<&String> = proof.z_attrs.keys().chain(proof.revealed.keys()).collect();
    let expected: BTreeSet<&String> = gens.attrs.keys().collect();
    if covered != expected || covered.len() != proof.z_attrs.len() + proof.revealed.len() {
        return Err(ProofError::MalformedPresentation(
            "sub-proof attributes do not match the definition".into(),
        ));
    }

    if proof.a_prime.is_zero() {
        return Ok(None);
    }
    if Bn254::pairing(proof.a_prime, *w) != Bn254::pairing(proof.a_bar, Generators::g2()) {
        return Ok(None);
    }

    let t1 = proof.a_prime * (-proof.z_e) + gens.h0 * proof.z_r2
        - (proof.a_bar.into_group() - proof.d.into_group()) * c;

    let mut disclosed: G1Projective = Generators::g1().into_group();
    for (name, encoded) in &proof.revealed {
        disclosed += gens.attr(name)? * crypto::attribute_scalar(encoded);
    }
    let mut t2: G1Projective = proof.d * proof.z_r3
        - gens.h0 * proof.z_s
        - gens.h_link * proof.z_link
        - gens.h_rev * proof.z_rev
        - disclosed * c;
    for (name, z) in &proof.z_attrs {
        t2 -= gens.attr(name)? * *z;
    }

    Ok(Some(PokCommitments {
        a_prime: proof.a_prime,
        a_bar: proof.a_bar,
        d: proof.d,
        t1: t1.into_affine(),
        t2: t2.into_affine(),
    }))
}
