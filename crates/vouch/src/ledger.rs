//! Ledger resolution.
//!
//! [`InMemoryLedger`] is a map-backed [`LedgerResolver`] loaded from a JSON
//! document. The `view_for_*` functions gather exactly the objects one
//! presentation needs into a [`LedgerView`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vouch_core::{
    CredDefId, CredentialDefinition, CredentialId, CredentialRecord, LedgerResolver, RevRegId,
    RevocationRegistryDefinition, RevocationState, Schema, SchemaId, VouchResult,
};
use vouch_proof::{LedgerView, Presentation, PresentationRequest, RequestedCredentials};

use crate::error::{RootError, RootResult};

/// On-disk form of an [`InMemoryLedger`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub cred_defs: Vec<CredentialDefinition>,
    #[serde(default)]
    pub rev_reg_defs: Vec<RevocationRegistryDefinition>,
    #[serde(default)]
    pub rev_states: Vec<RevocationState>,
}

/// Ledger held in memory. Revocation states are kept per registry as a
/// history ordered by timestamp.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    schemas: BTreeMap<SchemaId, Schema>,
    cred_defs: BTreeMap<CredDefId, CredentialDefinition>,
    rev_reg_defs: BTreeMap<RevRegId, RevocationRegistryDefinition>,
    rev_states: BTreeMap<RevRegId, Vec<RevocationState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    pub fn add_cred_def(&mut self, cred_def: CredentialDefinition) {
        self.cred_defs.insert(cred_def.id.clone(), cred_def);
    }

    pub fn add_rev_reg_def(&mut self, def: RevocationRegistryDefinition) {
        self.rev_reg_defs.insert(def.id.clone(), def);
    }

    /// Record a registry state. A state with the same timestamp is replaced.
    pub fn publish_rev_state(&mut self, state: RevocationState) {
        let history = self.rev_states.entry(state.rev_reg_id.clone()).or_default();
        match history.binary_search_by_key(&state.timestamp, |s| s.timestamp) {
            Ok(pos) => history[pos] = state,
            Err(pos) => history.insert(pos, state),
        }
    }

    pub fn from_document(document: LedgerDocument) -> Self {
        let mut ledger = Self::new();
        document.schemas.into_iter().for_each(|s| ledger.add_schema(s));
        document.cred_defs.into_iter().for_each(|c| ledger.add_cred_def(c));
        document
            .rev_reg_defs
            .into_iter()
            .for_each(|d| ledger.add_rev_reg_def(d));
        document
            .rev_states
            .into_iter()
            .for_each(|s| ledger.publish_rev_state(s));
        ledger
    }

    pub fn to_document(&self) -> LedgerDocument {
        LedgerDocument {
            schemas: self.schemas.values().cloned().collect(),
            cred_defs: self.cred_defs.values().cloned().collect(),
            rev_reg_defs: self.rev_reg_defs.values().cloned().collect(),
            rev_states: self.rev_states.values().flatten().cloned().collect(),
        }
    }

    /// Load a ledger document from a JSON file.
    pub fn load(path: &Path) -> RootResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RootError::Internal(format!("failed to read ledger {}: {}", path.display(), e))
        })?;
        let document: LedgerDocument = serde_json::from_str(&contents)?;
        Ok(Self::from_document(document))
    }

    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = serde_json::to_string_pretty(&self.to_document())?;
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }
}

impl LedgerResolver for InMemoryLedger {
    fn schema(&self, id: &SchemaId) -> VouchResult<Option<Schema>> {
        Ok(self.schemas.get(id).cloned())
    }

    fn credential_definition(&self, id: &CredDefId) -> VouchResult<Option<CredentialDefinition>> {
        Ok(self.cred_defs.get(id).cloned())
    }

    fn revocation_registry_definition(
        &self,
        id: &RevRegId,
    ) -> VouchResult<Option<RevocationRegistryDefinition>> {
        Ok(self.rev_reg_defs.get(id).cloned())
    }

    fn revocation_state(
        &self,
        id: &RevRegId,
        timestamp: Option<u64>,
    ) -> VouchResult<Option<RevocationState>> {
        let Some(history) = self.rev_states.get(id) else {
            return Ok(None);
        };
        let state = match timestamp {
            None => history.last(),
            Some(ts) => history.iter().rev().find(|s| s.timestamp <= ts),
        };
        Ok(state.cloned())
    }
}

/// Earliest `to` bound among the intervals of referents answered by
/// `cred_id`. Revocation state is resolved as of that time.
fn interval_end(
    request: &PresentationRequest,
    requested: &RequestedCredentials,
    cred_id: &CredentialId,
) -> Option<u64> {
    let attributes = requested
        .requested_attributes
        .iter()
        .filter(|(_, choice)| &choice.cred_id == cred_id)
        .filter_map(|(referent, _)| request.attribute_interval(referent));
    let predicates = requested
        .requested_predicates
        .iter()
        .filter(|(_, choice)| &choice.cred_id == cred_id)
        .filter_map(|(referent, _)| request.predicate_interval(referent));
    attributes.chain(predicates).filter_map(|i| i.to).min()
}

/// Resolve the ledger objects behind `records` for building a presentation.
///
/// Objects the resolver does not know are left out; the builder reports
/// them as missing.
pub fn view_for_request(
    request: &PresentationRequest,
    requested: &RequestedCredentials,
    records: &[CredentialRecord],
    resolver: &dyn LedgerResolver,
) -> RootResult<LedgerView> {
    let mut view = LedgerView::new();
    for record in records {
        if let Some(schema) = resolver.schema(&record.schema_id)? {
            view = view.with_schema(schema);
        }
        if let Some(cred_def) = resolver.credential_definition(&record.cred_def_id)? {
            view = view.with_cred_def(cred_def);
        }
        if let Some(rev_reg_id) = &record.rev_reg_id {
            if let Some(def) = resolver.revocation_registry_definition(rev_reg_id)? {
                view = view.with_rev_reg_def(def);
            }
            let at = interval_end(request, requested, &record.id);
            if let Some(state) = resolver.revocation_state(rev_reg_id, at)? {
                view = view.with_rev_state(state);
            }
        }
    }
    debug!(
        schemas = view.schemas.len(),
        cred_defs = view.cred_defs.len(),
        rev_states = view.rev_states.len(),
        "ledger view resolved"
    );
    Ok(view)
}

/// Resolve the ledger objects a verifier needs for `presentation`.
pub fn view_for_presentation(
    presentation: &Presentation,
    resolver: &dyn LedgerResolver,
) -> RootResult<LedgerView> {
    let mut view = LedgerView::new();
    for identifier in &presentation.identifiers {
        if let Some(schema) = resolver.schema(&identifier.schema_id)? {
            view = view.with_schema(schema);
        }
        if let Some(cred_def) = resolver.credential_definition(&identifier.cred_def_id)? {
            view = view.with_cred_def(cred_def);
        }
        if let Some(rev_reg_id) = &identifier.rev_reg_id {
            if let Some(def) = resolver.revocation_registry_definition(rev_reg_id)? {
                view = view.with_rev_reg_def(def);
            }
            if let Some(state) = resolver.revocation_state(rev_reg_id, identifier.timestamp)? {
                view = view.with_rev_state(state);
            }
        }
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use vouch_core::Generators;

    fn state(timestamp: u64) -> RevocationState {
        RevocationState {
            rev_reg_id: RevRegId::new("reg"),
            timestamp,
            accumulator: Generators::g1(),
            issued: BTreeSet::new(),
            registry_updated_at: 0,
        }
    }

    #[test]
    fn test_state_history_lookup() {
        let mut ledger = InMemoryLedger::new();
        ledger.publish_rev_state(state(300));
        ledger.publish_rev_state(state(100));
        ledger.publish_rev_state(state(200));
        let id = RevRegId::new("reg");

        let latest = ledger.revocation_state(&id, None).unwrap().unwrap();
        assert_eq!(latest.timestamp, 300);
        let at = ledger.revocation_state(&id, Some(250)).unwrap().unwrap();
        assert_eq!(at.timestamp, 200);
        assert!(ledger.revocation_state(&id, Some(50)).unwrap().is_none());
        assert!(ledger
            .revocation_state(&RevRegId::new("other"), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_same_timestamp_replaces() {
        let mut ledger = InMemoryLedger::new();
        ledger.publish_rev_state(state(100));
        let mut newer = state(100);
        newer.registry_updated_at = 90;
        ledger.publish_rev_state(newer);

        assert_eq!(ledger.to_document().rev_states.len(), 1);
        let got = ledger
            .revocation_state(&RevRegId::new("reg"), Some(100))
            .unwrap()
            .unwrap();
        assert_eq!(got.registry_updated_at, 90);
    }

    #[test]
    fn test_document_file_roundtrip() {
        let path = std::env::temp_dir().join("vouch-test-ledger.json");
        let mut ledger = InMemoryLedger::new();
        ledger.add_schema(Schema {
            id: SchemaId::new("did:issuer:2:person:1.0"),
            name: "person".into(),
            version: "1.0".into(),
            issuer_id: "did:issuer".into(),
            attr_names: vec!["name".into()],
        });
        ledger.publish_rev_state(state(7));
        ledger.save(&path).unwrap();

        let loaded = InMemoryLedger::load(&path).unwrap();
        assert!(loaded
            .schema(&SchemaId::new("did:issuer:2:person:1.0"))
            .unwrap()
            .is_some());
        assert_eq!(loaded.to_document().rev_states.len(), 1);
        let _ = std::fs::remove_file(&path);
    }
}
