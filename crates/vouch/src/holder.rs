//! Holder facade.
//!
//! [`CredentialHolder`] is the whole surface offered to the messaging
//! layer. [`Holder`] picks the implementation from the configured
//! [`ProofSystem`].

use tracing::info;
use vouch_core::{
    CredentialDefinition, CredentialId, CredentialRecord, ErrorKind, LedgerResolver, LinkSecretId,
    RevocationRegistryDefinition, StorageBackend,
};
use vouch_cred::{
    CredentialData, CredentialOffer, CredentialRequest, CredentialRequestMetadata, StoreOptions,
};
use vouch_proof::{LedgerView, Presentation, PresentationRequest, RequestedCredentials};
use vouch_vault::mime::MimeTypes;
use vouch_vault::CredentialStore;

use crate::config::ProofSystem;
use crate::error::RootResult;
use crate::ledger;

pub trait CredentialHolder {
    /// Owned copy of a stored credential.
    fn get_credential(&self, id: &CredentialId) -> RootResult<CredentialRecord>;

    /// Remove a credential for good. Its revocation index is left behind.
    fn delete_credential(&self, id: &CredentialId) -> RootResult<()>;

    /// MIME type recorded for one attribute. `None` when the attribute is
    /// unknown or carries no type.
    fn mime_type_of(&self, id: &CredentialId, attribute: &str) -> RootResult<Option<String>>;

    /// Every recorded MIME type of a credential.
    fn mime_types_of(&self, id: &CredentialId) -> RootResult<MimeTypes>;

    fn create_credential_request(
        &self,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        holder_did: &str,
    ) -> RootResult<(CredentialRequest, CredentialRequestMetadata)>;

    fn store_credential(
        &self,
        cred_def: &CredentialDefinition,
        data: &CredentialData,
        metadata: &CredentialRequestMetadata,
        options: &StoreOptions,
        rev_reg_def: Option<&RevocationRegistryDefinition>,
    ) -> RootResult<CredentialId>;

    fn create_presentation(
        &self,
        request: &PresentationRequest,
        requested: &RequestedCredentials,
        ledger: &LedgerView,
    ) -> RootResult<Presentation>;

    /// Like [`CredentialHolder::create_presentation`], with ledger objects
    /// looked up through `resolver`.
    fn create_presentation_resolved(
        &self,
        request: &PresentationRequest,
        requested: &RequestedCredentials,
        resolver: &dyn LedgerResolver,
    ) -> RootResult<Presentation> {
        let mut records = Vec::new();
        for id in requested.credential_ids() {
            match self.get_credential(&id) {
                Ok(record) => records.push(record),
                // reported by the builder
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        let view = ledger::view_for_request(request, requested, &records, resolver)?;
        self.create_presentation(request, requested, &view)
    }
}

/// Holder over BBS+ credentials, keeping everything in one credential
/// store.
pub struct BbsHolder<S: StorageBackend> {
    store: CredentialStore<S>,
    link_secret_id: LinkSecretId,
}

impl<S: StorageBackend> BbsHolder<S> {
    /// Open a holder, creating its link secret on first use.
    pub fn new(store: CredentialStore<S>, link_secret_id: LinkSecretId) -> RootResult<Self> {
        store.ensure_link_secret(&link_secret_id)?;
        Ok(Self {
            store,
            link_secret_id,
        })
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn link_secret_id(&self) -> &LinkSecretId {
        &self.link_secret_id
    }
}

impl<S: StorageBackend> CredentialHolder for BbsHolder<S> {
    fn get_credential(&self, id: &CredentialId) -> RootResult<CredentialRecord> {
        Ok(self.store.get(id)?)
    }

    fn delete_credential(&self, id: &CredentialId) -> RootResult<()> {
        Ok(self.store.delete(id)?)
    }

    fn mime_type_of(&self, id: &CredentialId, attribute: &str) -> RootResult<Option<String>> {
        Ok(self.store.mime_type_of(id, attribute)?)
    }

    fn mime_types_of(&self, id: &CredentialId) -> RootResult<MimeTypes> {
        Ok(self.store.mime_types_of(id)?)
    }

    fn create_credential_request(
        &self,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        holder_did: &str,
    ) -> RootResult<(CredentialRequest, CredentialRequestMetadata)> {
        let secret = self.store.link_secret(&self.link_secret_id)?;
        Ok(vouch_cred::create_credential_request(
            offer,
            cred_def,
            holder_did,
            &secret,
            &self.link_secret_id,
        )?)
    }

    fn store_credential(
        &self,
        cred_def: &CredentialDefinition,
        data: &CredentialData,
        metadata: &CredentialRequestMetadata,
        options: &StoreOptions,
        rev_reg_def: Option<&RevocationRegistryDefinition>,
    ) -> RootResult<CredentialId> {
        // the secret the request was blinded with
        let secret = self.store.link_secret(&metadata.link_secret_id)?;
        Ok(vouch_cred::store_credential(
            &self.store,
            cred_def,
            data,
            metadata,
            &secret,
            options,
            rev_reg_def,
        )?)
    }

    fn create_presentation(
        &self,
        request: &PresentationRequest,
        requested: &RequestedCredentials,
        ledger: &LedgerView,
    ) -> RootResult<Presentation> {
        let secret = self.store.link_secret(&self.link_secret_id)?;
        Ok(vouch_proof::create_presentation(
            request,
            requested,
            ledger,
            &secret,
            &self.store,
        )?)
    }
}

/// Holder implementation selected by [`ProofSystem`].
pub enum Holder<S: StorageBackend> {
    Bbs(BbsHolder<S>),
}

impl<S: StorageBackend> Holder<S> {
    pub fn new(
        proof_system: ProofSystem,
        store: CredentialStore<S>,
        link_secret_id: LinkSecretId,
    ) -> RootResult<Self> {
        let holder = match proof_system {
            ProofSystem::Bbs => Holder::Bbs(BbsHolder::new(store, link_secret_id)?),
        };
        info!(proof_system = ?proof_system, "holder opened");
        Ok(holder)
    }

    pub fn proof_system(&self) -> ProofSystem {
        match self {
            Holder::Bbs(_) => ProofSystem::Bbs,
        }
    }

    fn inner(&self) -> &dyn CredentialHolder {
        match self {
            Holder::Bbs(h) => h,
        }
    }
}

impl<S: StorageBackend> CredentialHolder for Holder<S> {
    fn get_credential(&self, id: &CredentialId) -> RootResult<CredentialRecord> {
        self.inner().get_credential(id)
    }

    fn delete_credential(&self, id: &CredentialId) -> RootResult<()> {
        self.inner().delete_credential(id)
    }

    fn mime_type_of(&self, id: &CredentialId, attribute: &str) -> RootResult<Option<String>> {
        self.inner().mime_type_of(id, attribute)
    }

    fn mime_types_of(&self, id: &CredentialId) -> RootResult<MimeTypes> {
        self.inner().mime_types_of(id)
    }

    fn create_credential_request(
        &self,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        holder_did: &str,
    ) -> RootResult<(CredentialRequest, CredentialRequestMetadata)> {
        self.inner()
            .create_credential_request(offer, cred_def, holder_did)
    }

    fn store_credential(
        &self,
        cred_def: &CredentialDefinition,
        data: &CredentialData,
        metadata: &CredentialRequestMetadata,
        options: &StoreOptions,
        rev_reg_def: Option<&RevocationRegistryDefinition>,
    ) -> RootResult<CredentialId> {
        self.inner()
            .store_credential(cred_def, data, metadata, options, rev_reg_def)
    }

    fn create_presentation(
        &self,
        request: &PresentationRequest,
        requested: &RequestedCredentials,
        ledger: &LedgerView,
    ) -> RootResult<Presentation> {
        self.inner().create_presentation(request, requested, ledger)
    }
}
