use std::collections::BTreeMap;

use vouch_core::crypto::{encode_attribute, Fr, LinkSecret};
use vouch_core::testing::TestSigner;
use vouch_core::{
    AttributeEntry, CredDefId, CredentialId, CredentialRecord, CredentialSignature, Generators,
    LinkSecretId, SchemaId,
};
use vouch_vault::{
    BlindStorageWrapper, CredentialStore, InMemoryBackend, KeyHierarchy, VaultError,
    VerifiedRecord,
};

fn record(id: &str) -> VerifiedRecord {
    let signer = TestSigner::new(&["photo"]);
    let secret = LinkSecret::generate();
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "photo".to_string(),
        AttributeEntry {
            raw: "aGVsbG8=".into(),
            encoded: encode_attribute("aGVsbG8="),
            mime_type: Some("image/png".into()),
        },
    );
    let mut record = CredentialRecord {
        id: CredentialId::new(id),
        schema_id: SchemaId::new("schema"),
        cred_def_id: CredDefId::new("cred-def"),
        issuer_id: "issuer".into(),
        attributes,
        signature: CredentialSignature {
            a: Generators::g1(),
            e: Fr::from(11u64),
            s: Fr::from(13u64),
        },
        rev_reg_id: None,
        rev_index: None,
        link_secret_id: LinkSecretId::new("default"),
    };
    signer.sign(&mut record, &secret).unwrap();
    VerifiedRecord::check(record, signer.cred_def(), &secret).unwrap()
}

fn blind_store() -> CredentialStore<BlindStorageWrapper<InMemoryBackend>> {
    let keys = KeyHierarchy::from_raw_key([7u8; 32]);
    CredentialStore::new(BlindStorageWrapper::from_hierarchy(InMemoryBackend::new(), &keys).unwrap())
}

#[test]
fn credential_lifecycle_over_blind_storage() {
    let store = blind_store();
    let verified = record("cred-1");
    store.insert(&verified).unwrap();
    let rec = verified.record();

    assert_eq!(&store.get(&rec.id).unwrap(), rec);
    assert_eq!(
        store.mime_type_of(&rec.id, "photo").unwrap().as_deref(),
        Some("image/png")
    );

    assert!(matches!(
        store.insert(&verified),
        Err(VaultError::DuplicateCredentialId(_))
    ));

    store.delete(&rec.id).unwrap();
    assert!(matches!(
        store.get(&rec.id),
        Err(VaultError::CredentialNotFound(_))
    ));
    assert!(store.backend().inner().is_empty());
}

#[test]
fn link_secret_survives_in_blind_storage() {
    let store = blind_store();
    let id = LinkSecretId::new("main");
    let secret = LinkSecret::generate();
    store.store_link_secret(&id, &secret).unwrap();
    assert_eq!(store.link_secret(&id).unwrap(), secret);

    for (_, value) in store.backend().inner().entries() {
        let text = String::from_utf8_lossy(&value);
        assert!(!text.contains(&secret.to_hex()));
    }
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_backed_store_persists_across_reopen() {
    use vouch_vault::SqliteBackend;

    let path = std::env::temp_dir().join(format!("vouch-store-{}.db", CredentialId::generate()));
    let keys = KeyHierarchy::from_raw_key([9u8; 32]);
    let verified = record("persisted");
    {
        let backend = SqliteBackend::open(&path).unwrap();
        let store =
            CredentialStore::new(BlindStorageWrapper::from_hierarchy(backend, &keys).unwrap());
        store.insert(&verified).unwrap();
    }
    let backend = SqliteBackend::open(&path).unwrap();
    let store = CredentialStore::new(BlindStorageWrapper::from_hierarchy(backend, &keys).unwrap());
    let rec = verified.record();
    assert_eq!(&store.get(&rec.id).unwrap(), rec);
    let _ = std::fs::remove_file(&path);
}
