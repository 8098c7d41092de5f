//! Ed25519 key pairs, signing, verification, and external key encodings (§4.3).

use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signer, Verifier};
use zeroize::{Zeroizing, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Raw public-key length, per §4.3's "raw 32-byte public-key export".
pub const PUBLIC_KEY_LEN: usize = 32;
/// Raw signature length.
pub const SIGNATURE_LEN: usize = 64;

/// The SSH-wire type tag used by the standard external public-key format.
const EXTERNAL_KEY_TYPE_TAG: &str = "ssh-ed25519";

/// An Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Raw 64-byte encoding.
    #[must_use]
    pub fn to_bytes(self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    /// Decode from a 64-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; SIGNATURE_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SIGNATURE_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

/// An Ed25519 private signing key. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    /// Generate a fresh key pair from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut csprng = rand_core::OsRng;
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// The corresponding public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign `message`, producing a detached signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// Raw 32-byte seed export. Only meaningful for keys marked exportable
    /// by the caller; this type itself does not track that flag (the key
    /// store does, in [`crate::keystore`]).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Reconstruct from a raw 32-byte seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&arr)))
    }

    /// PKCS8 DER export of the private key, per §4.3/§4.7.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Import a private key from a PKCS8 DER document.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = ed25519_dalek::SigningKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::Pkcs8(e.to_string()))?;
        Ok(Self(key))
    }
}

/// An Ed25519 public verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl VerifyingKey {
    /// Verify `signature` against `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Raw 32-byte export, per §4.3's "raw 32-byte public-key export".
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Import from a raw 32-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: bytes.len(),
                })?;
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }

    /// SHA-256 hex fingerprint of the raw public key (§4.3, §8 S1).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        crate::hash::fingerprint(&self.to_bytes())
    }

    /// Standard external public-key formatting: a length-prefixed type tag
    /// followed by a length-prefixed raw key, ASCII-armored with a type
    /// prefix and base64 body (the same shape as an OpenSSH
    /// `authorized_keys` entry).
    #[must_use]
    pub fn to_external_format(&self) -> String {
        let wire = encode_wire(&self.to_bytes());
        format!(
            "{EXTERNAL_KEY_TYPE_TAG} {}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, wire)
        )
    }

    /// Parse the standard external public-key format produced by
    /// [`Self::to_external_format`].
    pub fn from_external_format(armored: &str) -> Result<Self, CryptoError> {
        let mut parts = armored.trim().splitn(2, ' ');
        let tag = parts
            .next()
            .ok_or_else(|| CryptoError::InvalidExternalFormat("missing type tag".into()))?;
        if tag != EXTERNAL_KEY_TYPE_TAG {
            return Err(CryptoError::InvalidExternalFormat(format!(
                "unexpected type tag `{tag}`"
            )));
        }
        let body = parts
            .next()
            .ok_or_else(|| CryptoError::InvalidExternalFormat("missing base64 body".into()))?;
        let wire = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, body.trim())
            .map_err(|e| CryptoError::InvalidExternalFormat(e.to_string()))?;
        let raw = decode_wire(&wire)?;
        Self::from_bytes(&raw)
    }
}

/// `[4-byte BE len][type tag bytes][4-byte BE len][raw key bytes]`.
fn encode_wire(raw_key: &[u8; PUBLIC_KEY_LEN]) -> Vec<u8> {
    let tag = EXTERNAL_KEY_TYPE_TAG.as_bytes();
    let mut out = Vec::with_capacity(4 + tag.len() + 4 + raw_key.len());
    out.extend_from_slice(&(tag.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(&(raw_key.len() as u32).to_be_bytes());
    out.extend_from_slice(raw_key);
    out
}

fn decode_wire(wire: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if wire.len() < 4 {
        return Err(CryptoError::InvalidExternalFormat("truncated tag length".into()));
    }
    let tag_len = u32::from_be_bytes([wire[0], wire[1], wire[2], wire[3]]) as usize;
    let after_tag = 4 + tag_len;
    if wire.len() < after_tag + 4 {
        return Err(CryptoError::InvalidExternalFormat("truncated key length".into()));
    }
    let tag = &wire[4..after_tag];
    if tag != EXTERNAL_KEY_TYPE_TAG.as_bytes() {
        return Err(CryptoError::InvalidExternalFormat(
            "wire type tag mismatch".into(),
        ));
    }
    let key_len =
        u32::from_be_bytes([wire[after_tag], wire[after_tag + 1], wire[after_tag + 2], wire[after_tag + 3]])
            as usize;
    let key_start = after_tag + 4;
    if wire.len() != key_start + key_len {
        return Err(CryptoError::InvalidExternalFormat("trailing or missing key bytes".into()));
    }
    Ok(wire[key_start..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let key = SigningKey::generate();
        let sig = key.sign(b"hello wsh");
        assert!(key.verifying_key().verify(b"hello wsh", &sig).is_ok());
    }

    #[test]
    fn wrong_message_fails_verification() {
        let key = SigningKey::generate();
        let sig = key.sign(b"hello wsh");
        assert!(key.verifying_key().verify(b"goodbye", &sig).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let sig = key.sign(b"hello wsh");
        assert!(other.verifying_key().verify(b"hello wsh", &sig).is_err());
    }

    #[test]
    fn signature_bytes_roundtrip() {
        let key = SigningKey::generate();
        let sig = key.sign(b"payload");
        let restored = Signature::from_slice(&sig.to_bytes()).unwrap();
        assert_eq!(sig, restored);
    }

    #[test]
    fn signature_from_slice_wrong_size() {
        assert!(Signature::from_slice(&[0u8; 10]).is_err());
    }

    #[test]
    fn raw_public_key_roundtrip() {
        let key = SigningKey::generate();
        let vk = key.verifying_key();
        let restored = VerifyingKey::from_bytes(&vk.to_bytes()).unwrap();
        assert_eq!(vk, restored);
    }

    #[test]
    fn signing_key_seed_roundtrip() {
        let key = SigningKey::generate();
        let seed = key.to_bytes();
        let restored = SigningKey::from_bytes(&seed).unwrap();
        assert_eq!(key.verifying_key(), restored.verifying_key());
    }

    #[test]
    fn pkcs8_export_import_roundtrip() {
        let key = SigningKey::generate();
        let der = key.to_pkcs8_der().unwrap();
        let restored = SigningKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(key.verifying_key(), restored.verifying_key());
    }

    #[test]
    fn external_format_roundtrips() {
        let key = SigningKey::generate();
        let vk = key.verifying_key();
        let armored = vk.to_external_format();
        assert!(armored.starts_with("ssh-ed25519 "));
        let restored = VerifyingKey::from_external_format(&armored).unwrap();
        assert_eq!(vk, restored);
    }

    #[test]
    fn external_format_rejects_wrong_tag() {
        let err = VerifyingKey::from_external_format("ssh-rsa AAAA");
        assert!(err.is_err());
    }

    #[test]
    fn fingerprint_matches_hash_module() {
        let key = SigningKey::generate();
        let vk = key.verifying_key();
        assert_eq!(vk.fingerprint(), crate::hash::fingerprint(&vk.to_bytes()));
    }
}
