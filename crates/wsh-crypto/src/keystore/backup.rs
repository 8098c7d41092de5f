//! Passphrase-encrypted backup of exportable key-store entries (§4.7, §6).
//!
//! ## Security Properties
//!
//! - **Key derivation:** PBKDF2-HMAC-SHA256, 310 000 iterations
//! - **Encryption:** AES-256-GCM
//! - **Plaintext:** a UTF-8 JSON array of `(name, created-at, fingerprint,
//!   public-raw, private-pkcs8)` tuples, one per exportable entry
//!
//! ## Blob format
//!
//! ```text
//! +----------------+----------------+------------------------------+
//! | Salt (16B)     | IV (12B)       | Ciphertext || Tag (16B)       |
//! +----------------+----------------+------------------------------+
//! ```

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::KeyStoreError;
use crate::random::{random_iv_12, random_salt_16};

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count mandated for the backup key, per §4.7.
pub const PBKDF2_ITERATIONS: u32 = 310_000;

/// One entry in the serialized backup payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// User-chosen name.
    pub name: String,
    /// Creation time, Unix seconds.
    pub created_at: u64,
    /// Hex SHA-256 fingerprint.
    pub fingerprint: String,
    /// Raw 32-byte public key.
    pub public_key: Vec<u8>,
    /// PKCS8 DER-encoded private key.
    pub private_key_pkcs8: Vec<u8>,
}

fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt `entries` under `passphrase`, producing the `[salt][iv][ciphertext‖tag]` blob.
pub fn encrypt(entries: &[BackupEntry], passphrase: &str) -> Result<Vec<u8>, KeyStoreError> {
    let plaintext = serde_json::to_vec(entries)?;
    let salt = random_salt_16().map_err(crate::error::CryptoError::from)?;
    let iv = random_iv_12().map_err(crate::error::CryptoError::from)?;
    let key_bytes = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &plaintext,
                aad: &[],
            },
        )
        .map_err(|_| KeyStoreError::MalformedBackup("encryption failed".into()))?;

    let mut blob = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &[u8], passphrase: &str) -> Result<Vec<BackupEntry>, KeyStoreError> {
    if blob.len() < SALT_LEN + IV_LEN + TAG_LEN {
        return Err(KeyStoreError::TruncatedBackup);
    }
    let salt: [u8; SALT_LEN] = blob[..SALT_LEN].try_into().expect("checked length above");
    let iv = &blob[SALT_LEN..SALT_LEN + IV_LEN];
    let ciphertext = &blob[SALT_LEN + IV_LEN..];

    let key_bytes = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| KeyStoreError::DecryptionFailed)?;

    serde_json::from_slice(&plaintext).map_err(|e| KeyStoreError::MalformedBackup(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<BackupEntry> {
        vec![BackupEntry {
            name: "laptop".to_string(),
            created_at: 1_700_000_000,
            fingerprint: "a".repeat(64),
            public_key: vec![1u8; 32],
            private_key_pkcs8: vec![2u8; 48],
        }]
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let entries = sample_entries();
        let blob = encrypt(&entries, "correct horse battery staple").unwrap();
        let restored = decrypt(&blob, "correct horse battery staple").unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name, "laptop");
    }

    #[test]
    fn blob_has_salt_iv_prefix() {
        let blob = encrypt(&sample_entries(), "pass").unwrap();
        assert!(blob.len() > SALT_LEN + IV_LEN + TAG_LEN);
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let blob = encrypt(&sample_entries(), "right").unwrap();
        assert!(matches!(
            decrypt(&blob, "wrong"),
            Err(KeyStoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(
            decrypt(&[0u8; 4], "pass"),
            Err(KeyStoreError::TruncatedBackup)
        ));
    }

    #[test]
    fn different_passphrases_produce_different_blobs() {
        let a = encrypt(&sample_entries(), "one").unwrap();
        let b = encrypt(&sample_entries(), "one").unwrap();
        // distinct salt/iv each call even with the same passphrase and entries
        assert_ne!(a, b);
    }
}
