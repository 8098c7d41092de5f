//! Persistent Ed25519 key-pair registry, keyed by user-chosen name (§4.7).
//!
//! The registry itself is plaintext-on-disk metadata — name, fingerprint,
//! creation time, the exportable flag, and the raw key material — guarded
//! only by filesystem permissions, the way a local SSH `known_hosts`/key
//! directory works. Only [`backup`](KeyStore::backup) and
//! [`restore`](KeyStore::restore) touch passphrase encryption; see
//! [`backup`] for that format.

pub mod backup;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::KeyStoreError;
use crate::signatures::{SigningKey, VerifyingKey};

/// One entry in the key store: a name-addressed Ed25519 key pair plus the
/// metadata the spec's data model calls for.
pub struct KeyEntry {
    /// User-chosen name, unique within a store.
    pub name: String,
    /// Public key handle.
    pub public_key: VerifyingKey,
    /// Private key handle.
    pub private_key: SigningKey,
    /// Creation time, Unix seconds.
    pub created_at: u64,
    /// Hex SHA-256 fingerprint of the raw public key.
    pub fingerprint: String,
    /// Whether `exportPublicKey`/`backup` may expose this entry's raw and
    /// PKCS8 material. A non-exportable entry can still sign and verify.
    pub exportable: bool,
}

/// Summary returned by `generateKey` and used for `listKeys`/`getKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// User-chosen name.
    pub name: String,
    /// Hex SHA-256 fingerprint.
    pub fingerprint: String,
    /// Creation time, Unix seconds.
    pub created_at: u64,
    /// Whether the entry may be exported.
    pub exportable: bool,
    /// Standard external public-key formatting (§4.3).
    pub public_key_external: String,
}

impl KeyEntry {
    fn info(&self) -> KeyInfo {
        KeyInfo {
            name: self.name.clone(),
            fingerprint: self.fingerprint.clone(),
            created_at: self.created_at,
            exportable: self.exportable,
            public_key_external: self.public_key.to_external_format(),
        }
    }
}

/// On-disk representation of one [`KeyEntry`]. Plaintext — see the module
/// doc for why that's an intentional, documented choice.
#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    name: String,
    created_at: u64,
    fingerprint: String,
    exportable: bool,
    public_key: Vec<u8>,
    private_key_seed: Vec<u8>,
}

impl From<&KeyEntry> for PersistedEntry {
    fn from(entry: &KeyEntry) -> Self {
        PersistedEntry {
            name: entry.name.clone(),
            created_at: entry.created_at,
            fingerprint: entry.fingerprint.clone(),
            exportable: entry.exportable,
            public_key: entry.public_key.to_bytes().to_vec(),
            private_key_seed: entry.private_key.to_bytes().to_vec(),
        }
    }
}

impl TryFrom<PersistedEntry> for KeyEntry {
    type Error = KeyStoreError;

    fn try_from(persisted: PersistedEntry) -> Result<Self, Self::Error> {
        Ok(KeyEntry {
            name: persisted.name,
            public_key: VerifyingKey::from_bytes(&persisted.public_key)?,
            private_key: SigningKey::from_bytes(&persisted.private_key_seed)?,
            created_at: persisted.created_at,
            fingerprint: persisted.fingerprint,
            exportable: persisted.exportable,
        })
    }
}

/// The persistent key-pair registry.
///
/// Operations serialize through an internal [`tokio::sync::Mutex`] (the
/// spec's "the key store serializes its own operations internally"); callers
/// never need their own external locking.
pub struct KeyStore {
    path: PathBuf,
    entries: Arc<Mutex<HashMap<String, KeyEntry>>>,
}

impl KeyStore {
    /// Default registry path: `~/.config/wsh/keys.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wsh")
            .join("keys.json")
    }

    /// Open (or create) a key store backed by the registry file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = tokio::fs::read(&path).await?;
            let persisted: Vec<PersistedEntry> = serde_json::from_slice(&raw)?;
            let mut map = HashMap::with_capacity(persisted.len());
            for entry in persisted {
                let entry = KeyEntry::try_from(entry)?;
                map.insert(entry.name.clone(), entry);
            }
            map
        } else {
            HashMap::new()
        };
        Ok(KeyStore {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    async fn persist(&self, entries: &HashMap<String, KeyEntry>) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted: Vec<PersistedEntry> = entries.values().map(PersistedEntry::from).collect();
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Generate a new Ed25519 key pair under `name`.
    pub async fn generate_key(&self, name: &str, extractable: bool) -> Result<KeyInfo, KeyStoreError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(name) {
            return Err(KeyStoreError::DuplicateName(name.to_string()));
        }
        let private_key = SigningKey::generate();
        let public_key = private_key.verifying_key();
        let entry = KeyEntry {
            name: name.to_string(),
            fingerprint: public_key.fingerprint(),
            public_key,
            private_key,
            created_at: now_unix(),
            exportable: extractable,
        };
        let info = entry.info();
        entries.insert(name.to_string(), entry);
        self.persist(&entries).await?;
        Ok(info)
    }

    /// Fetch metadata for `name`.
    pub async fn get_key(&self, name: &str) -> Result<KeyInfo, KeyStoreError> {
        let entries = self.entries.lock().await;
        entries
            .get(name)
            .map(KeyEntry::info)
            .ok_or_else(|| KeyStoreError::NotFound(name.to_string()))
    }

    /// List metadata for every entry.
    pub async fn list_keys(&self) -> Vec<KeyInfo> {
        let entries = self.entries.lock().await;
        entries.values().map(KeyEntry::info).collect()
    }

    /// Sign `message` with the named entry's private key.
    ///
    /// The raw private key never leaves the store; callers that need to
    /// authenticate (§4.6's pubkey handshake) go through this rather than
    /// exporting key material.
    pub async fn sign(
        &self,
        name: &str,
        message: &[u8],
    ) -> Result<crate::signatures::Signature, KeyStoreError> {
        let entries = self.entries.lock().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| KeyStoreError::NotFound(name.to_string()))?;
        Ok(entry.private_key.sign(message))
    }

    /// Raw 32-byte public key for the named entry, for inclusion in an
    /// `Auth` record alongside a signature produced by [`KeyStore::sign`].
    pub async fn public_key_bytes(&self, name: &str) -> Result<[u8; 32], KeyStoreError> {
        let entries = self.entries.lock().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| KeyStoreError::NotFound(name.to_string()))?;
        Ok(entry.public_key.to_bytes())
    }

    /// Remove `name` from the store.
    pub async fn delete_key(&self, name: &str) -> Result<(), KeyStoreError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(name).is_none() {
            return Err(KeyStoreError::NotFound(name.to_string()));
        }
        self.persist(&entries).await?;
        Ok(())
    }

    /// Standard external formatting of `name`'s public key.
    pub async fn export_public_key(&self, name: &str) -> Result<String, KeyStoreError> {
        let entries = self.entries.lock().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| KeyStoreError::NotFound(name.to_string()))?;
        Ok(entry.public_key.to_external_format())
    }

    /// Encrypt every exportable entry under `passphrase`, per §4.7/§6.
    pub async fn backup(&self, passphrase: &str) -> Result<Vec<u8>, KeyStoreError> {
        let entries = self.entries.lock().await;
        let exportable: Vec<&KeyEntry> = entries.values().filter(|e| e.exportable).collect();
        if exportable.is_empty() && !entries.is_empty() {
            return Err(KeyStoreError::NoExportableKeys);
        }
        let mut backup_entries = Vec::with_capacity(exportable.len());
        for entry in exportable {
            backup_entries.push(backup::BackupEntry {
                name: entry.name.clone(),
                created_at: entry.created_at,
                fingerprint: entry.fingerprint.clone(),
                public_key: entry.public_key.to_bytes().to_vec(),
                private_key_pkcs8: entry
                    .private_key
                    .to_pkcs8_der()
                    .map_err(crate::error::KeyStoreError::from)?
                    .to_vec(),
            });
        }
        backup::encrypt(&backup_entries, passphrase)
    }

    /// Decrypt a backup blob and import every entry not already present,
    /// as non-exportable. Returns `(restored count, skipped count)`.
    pub async fn restore(&self, passphrase: &str, blob: &[u8]) -> Result<(usize, usize), KeyStoreError> {
        let backup_entries = backup::decrypt(blob, passphrase)?;
        let mut entries = self.entries.lock().await;
        let mut restored = 0;
        let mut skipped = 0;
        for backup_entry in backup_entries {
            if entries.contains_key(&backup_entry.name) {
                skipped += 1;
                continue;
            }
            let private_key = SigningKey::from_pkcs8_der(&backup_entry.private_key_pkcs8)?;
            let public_key = private_key.verifying_key();
            entries.insert(
                backup_entry.name.clone(),
                KeyEntry {
                    name: backup_entry.name,
                    public_key,
                    private_key,
                    created_at: backup_entry.created_at,
                    fingerprint: backup_entry.fingerprint,
                    exportable: false,
                },
            );
            restored += 1;
        }
        self.persist(&entries).await?;
        Ok((restored, skipped))
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (KeyStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::open(dir.path().join("keys.json")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn generate_then_get_round_trips() {
        let (store, _dir) = temp_store().await;
        let info = store.generate_key("laptop", true).await.unwrap();
        assert_eq!(info.name, "laptop");
        let fetched = store.get_key("laptop").await.unwrap();
        assert_eq!(fetched.fingerprint, info.fingerprint);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (store, _dir) = temp_store().await;
        store.generate_key("laptop", true).await.unwrap();
        let err = store.generate_key("laptop", true).await.unwrap_err();
        assert!(matches!(err, KeyStoreError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (store, _dir) = temp_store().await;
        store.generate_key("laptop", true).await.unwrap();
        store.delete_key("laptop").await.unwrap();
        assert!(matches!(
            store.get_key("laptop").await.unwrap_err(),
            KeyStoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn registry_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        {
            let store = KeyStore::open(&path).await.unwrap();
            store.generate_key("laptop", true).await.unwrap();
        }
        let reopened = KeyStore::open(&path).await.unwrap();
        assert_eq!(reopened.list_keys().await.len(), 1);
    }

    #[tokio::test]
    async fn export_public_key_returns_external_format() {
        let (store, _dir) = temp_store().await;
        store.generate_key("laptop", true).await.unwrap();
        let armored = store.export_public_key("laptop").await.unwrap();
        assert!(armored.starts_with("ssh-ed25519 "));
    }
}
