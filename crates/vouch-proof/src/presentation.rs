//! Presentation wire format and the Fiat–Shamir transcript shared by the
//! builder and the verifier.

use std::collections::BTreeMap;

use merlin::Transcript;
use serde::{Deserialize, Serialize};
use vouch_core::crypto::{ark_hex, Fr, TranscriptProtocol};
use vouch_core::{CredDefId, Nonce, RevRegId, SchemaId};

use crate::bbs_pok::{BbsProof, PokCommitments};
use crate::predicate::{self, PredicateProof, RangeCommitments};
use crate::revocation::{NonRevocCommitments, NonRevocProof};

const TRANSCRIPT_LABEL: &[u8] = b"vouch-presentation-v1";

/// Proof material for one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProof {
    pub primary: BbsProof,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<PredicateProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoc: Option<NonRevocProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedProof {
    /// One challenge over every sub-proof and the request nonce.
    #[serde(with = "ark_hex")]
    pub challenge: Fr,
    pub sub_proofs: Vec<SubProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttribute {
    pub sub_proof_index: usize,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProofReference {
    pub sub_proof_index: usize,
}

/// Referent-level answer, pointing into `AggregatedProof::sub_proofs`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttribute>,
    #[serde(default)]
    pub unrevealed_attrs: BTreeMap<String, SubProofReference>,
    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReference>,
}

/// Ledger coordinates of one sub-proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub proof: AggregatedProof,
    pub requested_proof: RequestedProof,
    /// Aligned with `proof.sub_proofs`.
    pub identifiers: Vec<Identifier>,
}

impl Presentation {
    pub fn sub_proof_count(&self) -> usize {
        self.proof.sub_proofs.len()
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

pub(crate) fn new_transcript(nonce: &Nonce, sub_proofs: usize) -> Transcript {
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    transcript.append_message(b"nonce", nonce.as_bytes());
    transcript.append_u64(b"sub-proofs", sub_proofs as u64);
    transcript
}

/// Public part of one predicate as it enters the transcript.
pub(crate) struct PredicateStatement<'a> {
    pub proof: &'a PredicateProof,
    pub range: Option<RangeCommitments>,
}

/// Everything one sub-proof contributes to the challenge.
pub(crate) struct SubProofStatement<'a> {
    pub identifier: &'a Identifier,
    pub revealed: &'a BTreeMap<String, String>,
    pub pok: PokCommitments,
    pub predicates: Vec<PredicateStatement<'a>>,
    pub non_revoc: Option<NonRevocCommitments>,
}

impl SubProofStatement<'_> {
    pub(crate) fn append_to(&self, transcript: &mut Transcript) {
        let id = self.identifier;
        transcript.append_message(b"schema-id", id.schema_id.as_str().as_bytes());
        transcript.append_message(b"cred-def-id", id.cred_def_id.as_str().as_bytes());
        if let (Some(rev_reg_id), Some(timestamp)) = (&id.rev_reg_id, id.timestamp) {
            transcript.append_message(b"rev-reg-id", rev_reg_id.as_str().as_bytes());
            transcript.append_u64(b"timestamp", timestamp);
        }
        for (name, encoded) in self.revealed {
            transcript.append_message(b"revealed-name", name.as_bytes());
            transcript.append_message(b"revealed-value", encoded.as_bytes());
        }
        self.pok.append_to(transcript);
        for statement in &self.predicates {
            predicate::append_statement(transcript, statement.proof, statement.range.as_ref());
        }
        if let Some(non_revoc) = &self.non_revoc {
            non_revoc.append_to(transcript);
        }
    }
}

pub(crate) fn challenge(transcript: &mut Transcript) -> Fr {
    transcript.challenge_scalar(b"challenge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_proof_defaults() {
        let proof: RequestedProof = serde_json::from_str("{}").unwrap();
        assert!(proof.revealed_attrs.is_empty());
        assert!(proof.predicates.is_empty());
    }

    #[test]
    fn test_identifier_omits_absent_revocation() {
        let id = Identifier {
            schema_id: SchemaId::new("s"),
            cred_def_id: CredDefId::new("cd"),
            rev_reg_id: None,
            timestamp: None,
        };
        let json = serde_json::to_string(&id).unwrap();
        assert!(!json.contains("rev_reg_id"));
        assert!(!json.contains("timestamp"));
    }

    #[test]
    fn test_transcript_depends_on_nonce() {
        let mut a = new_transcript(&Nonce([1u8; 32]), 1);
        let mut b = new_transcript(&Nonce([2u8; 32]), 1);
        assert_ne!(challenge(&mut a), challenge(&mut b));
    }
}
