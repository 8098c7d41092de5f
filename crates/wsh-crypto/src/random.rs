//! OS CSPRNG access for nonces and salts.

use crate::error::CryptoError;

/// Fill `buf` with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(buf).map_err(CryptoError::RandomFailed)
}

/// A fresh 32-byte nonce, per §4.3's "secure nonce generation (32 bytes)".
pub fn random_nonce_32() -> Result<[u8; 32], CryptoError> {
    let mut buf = [0u8; 32];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// A fresh 16-byte salt, for PBKDF2 key derivation.
pub fn random_salt_16() -> Result<[u8; 16], CryptoError> {
    let mut buf = [0u8; 16];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// A fresh 12-byte IV, for AES-256-GCM.
pub fn random_iv_12() -> Result<[u8; 12], CryptoError> {
    let mut buf = [0u8; 12];
    fill_random(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_not_all_zero() {
        let nonce = random_nonce_32().unwrap();
        assert_ne!(nonce, [0u8; 32]);
    }

    #[test]
    fn successive_calls_differ() {
        let a = random_nonce_32().unwrap();
        let b = random_nonce_32().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salt_and_iv_lengths() {
        assert_eq!(random_salt_16().unwrap().len(), 16);
        assert_eq!(random_iv_12().unwrap().len(), 12);
    }
}
