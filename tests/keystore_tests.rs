//! S1 (keygen + fingerprint) and S7 (key store backup/restore) scenarios.
//!
//! Neither needs a network peer: both exercise `wsh_crypto::KeyStore` against
//! a scratch directory.

use wsh_crypto::hash::short_fingerprint;
use wsh_crypto::{KeyStore, KeyStoreError};

async fn open_store() -> (KeyStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = KeyStore::open(dir.path().join("keys.json")).await.expect("open key store");
    (store, dir)
}

#[tokio::test]
async fn s1_keygen_and_fingerprint() {
    let (store, _dir) = open_store().await;

    let info = store.generate_key("laptop", true).await.expect("generate key");
    assert_eq!(info.name, "laptop");
    assert_eq!(info.fingerprint.len(), 64);
    assert!(info.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));

    let raw = store.public_key_bytes("laptop").await.expect("public key bytes");
    assert_eq!(raw.len(), 32);
    assert_eq!(info.fingerprint, wsh_crypto::hash::fingerprint(&raw));

    let short = short_fingerprint(&info.fingerprint, &[]);
    assert_eq!(short, &info.fingerprint[0..4]);
}

#[tokio::test]
async fn s7_backup_restore_round_trip() {
    let (store, _dir) = open_store().await;

    store.generate_key("a", true).await.expect("generate a");
    store.generate_key("b", true).await.expect("generate b");

    let blob = store.backup("p").await.expect("backup");

    store.delete_key("a").await.expect("delete a");
    assert!(store.get_key("a").await.is_err());

    let (restored, skipped) = store.restore("p", &blob).await.expect("restore");
    assert_eq!(restored, 1);
    assert_eq!(skipped, 1);
    assert!(store.get_key("a").await.is_ok());
}

#[tokio::test]
async fn s7_restore_wrong_passphrase_fails() {
    let (store, _dir) = open_store().await;
    store.generate_key("a", true).await.expect("generate a");
    let blob = store.backup("p").await.expect("backup");

    let err = store.restore("wrong", &blob).await.unwrap_err();
    assert!(matches!(err, KeyStoreError::DecryptionFailed));
}
