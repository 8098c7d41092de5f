//! SHA-256 fingerprinting and shortest-unique-prefix selection (§4.3).

use sha2::{Digest, Sha256};

/// Minimum length returned by [`short_fingerprint`], per §4.3.
pub const MIN_SHORT_FINGERPRINT_LEN: usize = 4;

/// Hex-encoded SHA-256 fingerprint of a raw public key.
#[must_use]
pub fn fingerprint(raw_public_key: &[u8]) -> String {
    let digest = Sha256::digest(raw_public_key);
    hex::encode(digest)
}

/// Shortest prefix of `fingerprint` (at least [`MIN_SHORT_FINGERPRINT_LEN`]
/// characters) that does not collide with any prefix of the same length
/// drawn from `others`.
///
/// `others` need not be full fingerprints; only the prefix at the trial
/// length is compared, so passing other full fingerprints or other short
/// fingerprints both work.
#[must_use]
pub fn short_fingerprint(fingerprint: &str, others: &[&str]) -> String {
    let mut len = MIN_SHORT_FINGERPRINT_LEN.min(fingerprint.len());
    loop {
        let candidate = &fingerprint[..len];
        let collides = others
            .iter()
            .any(|other| other.len() >= len && &other[..len] == candidate);
        if !collides || len >= fingerprint.len() {
            return candidate.to_string();
        }
        len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex_of_raw_bytes() {
        let key = [0u8; 32];
        let fp = fingerprint(&key);
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, hex::encode(Sha256::digest(key)));
    }

    #[test]
    fn short_fingerprint_of_empty_set_is_first_four_chars() {
        let fp = fingerprint(&[1u8; 32]);
        assert_eq!(short_fingerprint(&fp, &[]), &fp[0..4]);
    }

    #[test]
    fn short_fingerprint_extends_on_collision() {
        let fp_a = "aaaa1111".to_string() + &"0".repeat(56);
        let fp_b = "aaaa2222".to_string() + &"0".repeat(56);
        let short_a = short_fingerprint(&fp_a, &[&fp_b]);
        assert!(short_a.len() > 4);
        assert_ne!(short_a, short_fingerprint(&fp_b, &[&fp_a]));
    }

    #[test]
    fn short_fingerprint_never_exceeds_source_length() {
        let fp = "abcd";
        assert_eq!(short_fingerprint(fp, &["abcd"]), "abcd");
    }

    proptest::proptest! {
        #[test]
        fn short_fingerprint_is_always_a_prefix(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 32)) {
            let fp = fingerprint(&bytes);
            let short = short_fingerprint(&fp, &[]);
            proptest::prop_assert!(fp.starts_with(&short));
            proptest::prop_assert!(short.len() >= MIN_SHORT_FINGERPRINT_LEN);
        }
    }
}
