use std::collections::BTreeMap;

use vouch_core::{
    CredDefId, CredentialDefinition, RevRegId, RevocationRegistryDefinition, RevocationState,
    Schema, SchemaId,
};

use crate::error::{ProofError, ProofResult};

/// Ledger objects resolved by the caller for one presentation.
///
/// Revocation states are keyed by registry id; a registry belongs to exactly
/// one credential definition.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    pub schemas: BTreeMap<SchemaId, Schema>,
    pub cred_defs: BTreeMap<CredDefId, CredentialDefinition>,
    pub rev_reg_defs: BTreeMap<RevRegId, RevocationRegistryDefinition>,
    pub rev_states: BTreeMap<RevRegId, RevocationState>,
}

impl LedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas.insert(schema.id.clone(), schema);
        self
    }

    pub fn with_cred_def(mut self, cred_def: CredentialDefinition) -> Self {
        self.cred_defs.insert(cred_def.id.clone(), cred_def);
        self
    }

    pub fn with_rev_reg_def(mut self, def: RevocationRegistryDefinition) -> Self {
        self.rev_reg_defs.insert(def.id.clone(), def);
        self
    }

    pub fn with_rev_state(mut self, state: RevocationState) -> Self {
        self.rev_states.insert(state.rev_reg_id.clone(), state);
        self
    }

    pub fn schema(&self, id: &SchemaId) -> ProofResult<&Schema> {
        self.schemas
            .get(id)
            .ok_or_else(|| ProofError::MissingLedgerObject(format!("schema {}", id)))
    }

    pub fn cred_def(&self, id: &CredDefId) -> ProofResult<&CredentialDefinition> {
        self.cred_defs
            .get(id)
            .ok_or_else(|| ProofError::MissingLedgerObject(format!("credential definition {}", id)))
    }

    pub fn rev_reg_def(&self, id: &RevRegId) -> ProofResult<&RevocationRegistryDefinition> {
        self.rev_reg_defs
            .get(id)
            .ok_or_else(|| ProofError::MissingLedgerObject(format!("revocation registry {}", id)))
    }

    pub fn rev_state(&self, id: &RevRegId) -> ProofResult<&RevocationState> {
        self.rev_states
            .get(id)
            .ok_or_else(|| ProofError::MissingRevocationState(id.to_string()))
    }
}
