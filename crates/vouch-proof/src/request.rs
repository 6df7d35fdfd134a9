//! Presentation requests and the holder's answer to them.
//!
//! A verifier names what it wants by *referent*: an attribute referent asks
//! for one attribute of some credential, a predicate referent asks for a
//! comparison on an integer attribute. The holder answers each referent
//! with a credential id or, for unrestricted attributes, a self-attested
//! value.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use vouch_core::{CredDefId, CredentialDefinition, CredentialId, Nonce, Schema, SchemaId};

use crate::error::{ProofError, ProofResult};

/// Comparison proven by a predicate referent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GE,
    #[serde(rename = ">")]
    GT,
    #[serde(rename = "<=")]
    LE,
    #[serde(rename = "<")]
    LT,
}

impl PredicateType {
    /// Whether `value <op> bound` holds.
    pub fn holds(self, value: i32, bound: i32) -> bool {
        match self {
            PredicateType::GE => value >= bound,
            PredicateType::GT => value > bound,
            PredicateType::LE => value <= bound,
            PredicateType::LT => value < bound,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredicateType::GE => ">=",
            PredicateType::GT => ">",
            PredicateType::LE => "<=",
            PredicateType::LT => "<",
        }
    }

    /// `(σ, t)` with `σ·value + t >= 0` exactly when the predicate holds.
    pub(crate) fn offset(self, bound: i32) -> (i64, i64) {
        let bound = bound as i64;
        match self {
            PredicateType::GE => (1, -bound),
            PredicateType::GT => (1, -bound - 1),
            PredicateType::LE => (-1, bound),
            PredicateType::LT => (-1, bound - 1),
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window in which the credential must be shown to be unrevoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NonRevokedInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

impl NonRevokedInterval {
    pub fn contains(&self, timestamp: u64) -> bool {
        self.from.map_or(true, |from| timestamp >= from)
            && self.to.map_or(true, |to| timestamp <= to)
    }
}

/// Conditions on the credential behind a referent. Every present field
/// must match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Restriction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<CredDefId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
}

impl Restriction {
    pub fn matches(&self, schema: &Schema, cred_def: &CredentialDefinition) -> bool {
        self.schema_id.as_ref().map_or(true, |id| *id == schema.id)
            && self
                .schema_name
                .as_ref()
                .map_or(true, |name| *name == schema.name)
            && self
                .schema_version
                .as_ref()
                .map_or(true, |version| *version == schema.version)
            && self
                .cred_def_id
                .as_ref()
                .map_or(true, |id| *id == cred_def.id)
            && self
                .issuer_id
                .as_ref()
                .map_or(true, |issuer| *issuer == cred_def.issuer_id)
    }
}

/// An empty list admits any credential; otherwise one restriction must match.
pub fn restrictions_satisfied(
    restrictions: &[Restriction],
    schema: &Schema,
    cred_def: &CredentialDefinition,
) -> bool {
    restrictions.is_empty() || restrictions.iter().any(|r| r.matches(schema, cred_def))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl AttributeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restrictions: Vec::new(),
            non_revoked: None,
        }
    }

    pub fn restrict(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl PredicateInfo {
    pub fn new(name: impl Into<String>, p_type: PredicateType, p_value: i32) -> Self {
        Self {
            name: name.into(),
            p_type,
            p_value,
            restrictions: Vec::new(),
            non_revoked: None,
        }
    }

    pub fn restrict(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }
}

/// Verifier's request for a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRequest {
    pub name: String,
    pub version: String,
    pub nonce: Nonce,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl PresentationRequest {
    /// Structural checks for requests received from the wire.
    pub fn validate(&self) -> ProofResult<()> {
        if self.requested_attributes.is_empty() && self.requested_predicates.is_empty() {
            return Err(ProofError::InvalidRequest("request names no referents".into()));
        }
        for referent in self.requested_predicates.keys() {
            if self.requested_attributes.contains_key(referent) {
                return Err(ProofError::InvalidRequest(format!(
                    "referent {} is both an attribute and a predicate",
                    referent
                )));
            }
        }
        let names = self
            .requested_attributes
            .iter()
            .map(|(r, a)| (r, &a.name))
            .chain(self.requested_predicates.iter().map(|(r, p)| (r, &p.name)));
        for (referent, name) in names {
            if name.trim().is_empty() {
                return Err(ProofError::InvalidRequest(format!(
                    "referent {} names no attribute",
                    referent
                )));
            }
        }
        Ok(())
    }

    /// Interval that applies to an attribute referent: its own, else the
    /// request-level one.
    pub fn attribute_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_attributes
            .get(referent)
            .and_then(|a| a.non_revoked)
            .or(self.non_revoked)
    }

    pub fn predicate_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_predicates
            .get(referent)
            .and_then(|p| p.non_revoked)
            .or(self.non_revoked)
    }
}

/// Builder for a [`PresentationRequest`], validated on `build`.
pub struct PresentationRequestBuilder {
    name: String,
    version: String,
    nonce: Option<Nonce>,
    requested_attributes: BTreeMap<String, AttributeInfo>,
    requested_predicates: BTreeMap<String, PredicateInfo>,
    non_revoked: Option<NonRevokedInterval>,
}

impl PresentationRequestBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nonce: None,
            requested_attributes: BTreeMap::new(),
            requested_predicates: BTreeMap::new(),
            non_revoked: None,
        }
    }

    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn attribute(mut self, referent: impl Into<String>, info: AttributeInfo) -> Self {
        self.requested_attributes.insert(referent.into(), info);
        self
    }

    pub fn predicate(mut self, referent: impl Into<String>, info: PredicateInfo) -> Self {
        self.requested_predicates.insert(referent.into(), info);
        self
    }

    pub fn non_revoked(mut self, interval: NonRevokedInterval) -> Self {
        self.non_revoked = Some(interval);
        self
    }

    /// Build the request. A fresh nonce is drawn if none was set.
    pub fn build(self) -> ProofResult<PresentationRequest> {
        let request = PresentationRequest {
            name: self.name,
            version: self.version,
            nonce: self.nonce.unwrap_or_else(Nonce::generate),
            requested_attributes: self.requested_attributes,
            requested_predicates: self.requested_predicates,
            non_revoked: self.non_revoked,
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    pub cred_id: CredentialId,
    #[serde(default = "default_revealed")]
    pub revealed: bool,
}

fn default_revealed() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    pub cred_id: CredentialId,
}

/// Holder's choice of credential per referent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestedCredentials {
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
}

impl RequestedCredentials {
    pub fn reveal(mut self, referent: impl Into<String>, cred_id: CredentialId) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            RequestedAttribute {
                cred_id,
                revealed: true,
            },
        );
        self
    }

    pub fn conceal(mut self, referent: impl Into<String>, cred_id: CredentialId) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            RequestedAttribute {
                cred_id,
                revealed: false,
            },
        );
        self
    }

    pub fn predicate(mut self, referent: impl Into<String>, cred_id: CredentialId) -> Self {
        self.requested_predicates
            .insert(referent.into(), RequestedPredicate { cred_id });
        self
    }

    pub fn self_attest(mut self, referent: impl Into<String>, value: impl Into<String>) -> Self {
        self.self_attested_attributes
            .insert(referent.into(), value.into());
        self
    }

    /// Check that every referent of `request` is answered exactly once and
    /// nothing else is answered.
    pub fn check_coverage(&self, request: &PresentationRequest) -> ProofResult<()> {
        for referent in self.requested_attributes.keys() {
            if self.self_attested_attributes.contains_key(referent) {
                return Err(ProofError::AmbiguousReferent(referent.clone()));
            }
        }
        let answered_attrs: BTreeSet<&String> = self
            .requested_attributes
            .keys()
            .chain(self.self_attested_attributes.keys())
            .collect();

        for referent in answered_attrs.iter() {
            if !request.requested_attributes.contains_key(*referent) {
                return Err(ProofError::UnknownReferent((*referent).clone()));
            }
        }
        for referent in self.requested_predicates.keys() {
            if !request.requested_predicates.contains_key(referent) {
                return Err(ProofError::UnknownReferent(referent.clone()));
            }
        }
        for referent in request.requested_attributes.keys() {
            if !answered_attrs.contains(referent) {
                return Err(ProofError::MissingReferent(referent.clone()));
            }
        }
        for referent in request.requested_predicates.keys() {
            if !self.requested_predicates.contains_key(referent) {
                return Err(ProofError::MissingReferent(referent.clone()));
            }
        }
        for referent in self.self_attested_attributes.keys() {
            if let Some(info) = request.requested_attributes.get(referent) {
                if !info.restrictions.is_empty() {
                    return Err(ProofError::RestrictionNotSatisfied(referent.clone()));
                }
            }
        }
        Ok(())
    }

    /// Distinct credentials in first-use order: attribute referents, then
    /// predicate referents, each by referent name.
    pub fn credential_ids(&self) -> Vec<CredentialId> {
        let mut seen = BTreeSet::new();
        self.requested_attributes
            .values()
            .map(|a| &a.cred_id)
            .chain(self.requested_predicates.values().map(|p| &p.cred_id))
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PresentationRequest {
        PresentationRequestBuilder::new("proof-of-age", "1.0")
            .attribute("attr1_referent", AttributeInfo::new("name"))
            .attribute("attr2_referent", AttributeInfo::new("phone"))
            .predicate(
                "pred1_referent",
                PredicateInfo::new("age", PredicateType::GE, 18),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_predicate_holds() {
        assert!(PredicateType::GE.holds(18, 18));
        assert!(!PredicateType::GT.holds(18, 18));
        assert!(PredicateType::LE.holds(-5, 0));
        assert!(!PredicateType::LT.holds(0, 0));
    }

    #[test]
    fn test_predicate_offset_matches_holds() {
        for p in [PredicateType::GE, PredicateType::GT, PredicateType::LE, PredicateType::LT] {
            for value in [-3, 17, 18, 19, i32::MAX, i32::MIN] {
                let (sigma, t) = p.offset(18);
                assert_eq!(sigma * value as i64 + t >= 0, p.holds(value, 18));
            }
        }
    }

    #[test]
    fn test_predicate_type_wire_names() {
        let json = serde_json::to_string(&PredicateType::GE).unwrap();
        assert_eq!(json, "\">=\"");
        let p: PredicateType = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(p, PredicateType::LT);
    }

    #[test]
    fn test_interval_contains() {
        let open = NonRevokedInterval::default();
        assert!(open.contains(0));
        let window = NonRevokedInterval {
            from: Some(10),
            to: Some(20),
        };
        assert!(window.contains(10));
        assert!(window.contains(20));
        assert!(!window.contains(9));
        assert!(!window.contains(21));
    }

    #[test]
    fn test_referent_interval_overrides_request() {
        let mut req = request();
        req.non_revoked = Some(NonRevokedInterval {
            from: None,
            to: Some(100),
        });
        req.requested_attributes
            .get_mut("attr1_referent")
            .unwrap()
            .non_revoked = Some(NonRevokedInterval {
            from: Some(50),
            to: None,
        });
        assert_eq!(req.attribute_interval("attr1_referent").unwrap().from, Some(50));
        assert_eq!(req.attribute_interval("attr2_referent").unwrap().to, Some(100));
        assert_eq!(req.predicate_interval("pred1_referent").unwrap().to, Some(100));
    }

    #[test]
    fn test_empty_request_rejected() {
        let result = PresentationRequestBuilder::new("empty", "1.0").build();
        assert!(matches!(result, Err(ProofError::InvalidRequest(_))));
    }

    #[test]
    fn test_referent_in_both_maps_rejected() {
        let result = PresentationRequestBuilder::new("dup", "1.0")
            .attribute("r", AttributeInfo::new("age"))
            .predicate("r", PredicateInfo::new("age", PredicateType::GE, 1))
            .build();
        assert!(matches!(result, Err(ProofError::InvalidRequest(_))));
    }

    #[test]
    fn test_coverage_complete() {
        let id = CredentialId::new("c1");
        RequestedCredentials::default()
            .reveal("attr1_referent", id.clone())
            .self_attest("attr2_referent", "8-800-300")
            .predicate("pred1_referent", id.clone())
            .check_coverage(&request())
            .unwrap();
    }

    #[test]
    fn test_coverage_missing_referent() {
        let id = CredentialId::new("c1");
        let result = RequestedCredentials::default()
            .reveal("attr1_referent", id.clone())
            .predicate("pred1_referent", id)
            .check_coverage(&request());
        assert!(matches!(result, Err(ProofError::MissingReferent(r)) if r == "attr2_referent"));
    }

    #[test]
    fn test_coverage_unknown_referent() {
        let id = CredentialId::new("c1");
        let result = RequestedCredentials::default()
            .reveal("attr1_referent", id.clone())
            .reveal("attr2_referent", id.clone())
            .reveal("attr9_referent", id.clone())
            .predicate("pred1_referent", id)
            .check_coverage(&request());
        assert!(matches!(result, Err(ProofError::UnknownReferent(r)) if r == "attr9_referent"));
    }

    #[test]
    fn test_coverage_ambiguous_referent() {
        let id = CredentialId::new("c1");
        let result = RequestedCredentials::default()
            .reveal("attr1_referent", id.clone())
            .reveal("attr2_referent", id.clone())
            .self_attest("attr2_referent", "x")
            .predicate("pred1_referent", id)
            .check_coverage(&request());
        assert!(matches!(result, Err(ProofError::AmbiguousReferent(_))));
    }

    #[test]
    fn test_self_attested_restricted_referent() {
        let mut req = request();
        req.requested_attributes
            .get_mut("attr2_referent")
            .unwrap()
            .restrictions
            .push(Restriction {
                issuer_id: Some("did:issuer".into()),
                ..Default::default()
            });
        let id = CredentialId::new("c1");
        let result = RequestedCredentials::default()
            .reveal("attr1_referent", id.clone())
            .self_attest("attr2_referent", "x")
            .predicate("pred1_referent", id)
            .check_coverage(&req);
        assert!(matches!(result, Err(ProofError::RestrictionNotSatisfied(_))));
    }

    #[test]
    fn test_credential_ids_dedup_in_order() {
        let creds = RequestedCredentials::default()
            .reveal("a", CredentialId::new("c2"))
            .conceal("b", CredentialId::new("c1"))
            .reveal("c", CredentialId::new("c2"))
            .predicate("p", CredentialId::new("c3"));
        let ids: Vec<String> = creds
            .credential_ids()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["c2", "c1", "c3"]);
    }

    #[test]
    fn test_requested_attribute_revealed_defaults_true() {
        let attr: RequestedAttribute = serde_json::from_str(r#"{"cred_id":"c1"}"#).unwrap();
        assert!(attr.revealed);
    }
}
