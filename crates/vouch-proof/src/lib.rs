//! Vouch presentation engine.
//!
//! Builds zero-knowledge presentations over stored BBS+ credentials and
//! verifies them.
//!
//! ```text
//! PresentationRequest + RequestedCredentials
//!     -> grouped per credential -> committed -> one challenge -> Presentation
//! ```
//!
//! Each sub-proof proves knowledge of a signature, discloses the revealed
//! attributes, proves predicates on hidden integer attributes and, for
//! revocable credentials, membership in the registry accumulator. Equal
//! link-secret responses bind all sub-proofs to one holder.

pub mod bbs_pok;
pub mod builder;
pub mod error;
pub mod predicate;
pub mod presentation;
pub mod request;
pub mod revocation;
pub mod verify;
pub mod view;

pub use builder::create_presentation;
pub use error::{ProofError, ProofResult};
pub use presentation::{
    AggregatedProof, Identifier, Presentation, RequestedProof, RevealedAttribute, SubProof,
    SubProofReference,
};
pub use request::{
    AttributeInfo, NonRevokedInterval, PredicateInfo, PredicateType, PresentationRequest,
    PresentationRequestBuilder, RequestedAttribute, RequestedCredentials, RequestedPredicate,
    Restriction,
};
pub use revocation::{witness_for, RevocationWitness};
pub use verify::verify_presentation;
pub use view::LedgerView;
