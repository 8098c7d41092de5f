//! Error types for key material, signing, and the encrypted key store.

use thiserror::Error;

/// Failures from key generation, signing, verification, and encoding.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A raw key slice was not the expected length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length observed.
        actual: usize,
    },

    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,

    /// A signature slice was not the expected length or was otherwise malformed.
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// PKCS8 encoding or decoding failed.
    #[error("PKCS8 error: {0}")]
    Pkcs8(String),

    /// Standard external public-key formatting was malformed on decode.
    #[error("invalid external public-key encoding: {0}")]
    InvalidExternalFormat(String),

    /// The OS CSPRNG failed to produce randomness.
    #[error("random number generation failed: {0}")]
    RandomFailed(#[from] getrandom::Error),
}

/// Failures from the persistent key-pair registry and its encrypted backup.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// `generateKey` was called with a name already present in the store.
    #[error("a key named `{0}` already exists")]
    DuplicateName(String),

    /// The requested key name is not present in the store.
    #[error("no key named `{0}`")]
    NotFound(String),

    /// The key exists but was generated with `extractable = false`.
    #[error("key `{0}` is not exportable")]
    NotExportable(String),

    /// `backup` was called on a non-empty store with no exportable entries.
    #[error("store has entries but none are exportable")]
    NoExportableKeys,

    /// The backup blob failed to decrypt: wrong passphrase or corrupted data.
    #[error("decryption failed: wrong passphrase or corrupted backup")]
    DecryptionFailed,

    /// The backup blob was shorter than the minimum `[salt][iv][tag]` envelope.
    #[error("backup blob is truncated")]
    TruncatedBackup,

    /// The decrypted backup plaintext was not valid serialized entry data.
    #[error("backup payload is malformed: {0}")]
    MalformedBackup(String),

    /// A lower-level cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Reading or writing the key store's persisted state failed.
    #[error("key store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state failed to (de)serialize.
    #[error("key store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
