//! # wsh-crypto
//!
//! Ed25519 key pairs, fingerprinting, authentication transcript hashing, and
//! the passphrase-encrypted key store for the wsh protocol (§4.3, §4.7).
//!
//! ## Module Structure
//!
//! - [`signatures`]: key generation, signing, verification, PKCS8 and
//!   standard external public-key encodings
//! - [`hash`]: SHA-256 fingerprinting and shortest-unique-prefix selection
//! - [`transcript`]: authentication transcript hashing
//! - [`random`]: OS CSPRNG access for nonces, salts, and IVs
//! - [`keystore`]: the persistent named key-pair registry and its
//!   passphrase-encrypted backup format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod keystore;
pub mod random;
pub mod signatures;
pub mod transcript;

pub use error::{CryptoError, KeyStoreError};
pub use keystore::{KeyEntry, KeyInfo, KeyStore};
pub use signatures::{Signature, SigningKey, VerifyingKey};
