use crate::error::VouchResult;
use crate::ledger::{CredentialDefinition, RevocationRegistryDefinition, RevocationState, Schema};
use crate::record::CredentialRecord;
use crate::types::{CredDefId, CredentialId, RecordId, RevRegId, SchemaId};

// ---------------------------------------------------------------------------
// StorageBackend: the secure-storage collaborator
//
// Keyed by opaque record id. Implementations guard their state so that each
// call is atomic with respect to the others on the same id.
// ---------------------------------------------------------------------------

pub trait StorageBackend: Send + Sync {
    fn get(&self, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>>;
    fn put(&self, record_id: &RecordId, value: &[u8]) -> VouchResult<()>;
    fn delete(&self, record_id: &RecordId) -> VouchResult<bool>;

    /// Atomic compare-and-swap. `expected = None` means "only if absent".
    /// Returns true if the swap happened.
    fn compare_and_swap(
        &self,
        record_id: &RecordId,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> VouchResult<bool>;

    fn exists(&self, record_id: &RecordId) -> VouchResult<bool>;
}

// ---------------------------------------------------------------------------
// CredentialSource: read access to stored credentials
// ---------------------------------------------------------------------------

pub trait CredentialSource: Send + Sync {
    /// Owned copy of the record, `None` if absent.
    fn credential(&self, id: &CredentialId) -> VouchResult<Option<CredentialRecord>>;
}

// ---------------------------------------------------------------------------
// LedgerResolver: the ledger / registry collaborator
// ---------------------------------------------------------------------------

pub trait LedgerResolver: Send + Sync {
    fn schema(&self, id: &SchemaId) -> VouchResult<Option<Schema>>;

    fn credential_definition(&self, id: &CredDefId) -> VouchResult<Option<CredentialDefinition>>;

    fn revocation_registry_definition(
        &self,
        id: &RevRegId,
    ) -> VouchResult<Option<RevocationRegistryDefinition>>;

    /// Registry state as of `timestamp`, or the latest one when `None`.
    fn revocation_state(
        &self,
        id: &RevRegId,
        timestamp: Option<u64>,
    ) -> VouchResult<Option<RevocationState>>;
}
