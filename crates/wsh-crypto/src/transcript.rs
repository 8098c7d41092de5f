//! Authentication transcript hashing (§4.3).
//!
//! `transcript = SHA-256(PROTOCOL_VERSION || 0x00 || session_id_utf8 ||
//! server_nonce || channel_binding?)`. Binds a client's signature to the
//! protocol version and the specific session, preventing signature reuse
//! across sessions or versions.

use sha2::{Digest, Sha256};

/// Build the authentication transcript digest.
///
/// `protocol_version` is the wire-level version string (e.g. `"wsh-v1"`),
/// passed in rather than imported so this crate stays independent of the
/// message schema crate. `channel_binding` is an optional transport-level
/// binding (e.g. a TLS exporter value); omit it when the transport doesn't
/// provide one.
#[must_use]
pub fn build_transcript(
    protocol_version: &str,
    session_id: &str,
    server_nonce: &[u8],
    channel_binding: Option<&[u8]>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(protocol_version.as_bytes());
    hasher.update([0x00]);
    hasher.update(session_id.as_bytes());
    hasher.update(server_nonce);
    if let Some(binding) = channel_binding {
        hasher.update(binding);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_is_deterministic() {
        let a = build_transcript("wsh-v1", "sess-1", b"nonce", None);
        let b = build_transcript("wsh-v1", "sess-1", b"nonce", None);
        assert_eq!(a, b);
    }

    #[test]
    fn transcript_differs_across_sessions() {
        let a = build_transcript("wsh-v1", "sess-1", b"nonce", None);
        let b = build_transcript("wsh-v1", "sess-2", b"nonce", None);
        assert_ne!(a, b);
    }

    #[test]
    fn transcript_differs_across_protocol_versions() {
        let a = build_transcript("wsh-v1", "sess-1", b"nonce", None);
        let b = build_transcript("wsh-v2", "sess-1", b"nonce", None);
        assert_ne!(a, b);
    }

    #[test]
    fn channel_binding_changes_the_transcript() {
        let a = build_transcript("wsh-v1", "sess-1", b"nonce", None);
        let b = build_transcript("wsh-v1", "sess-1", b"nonce", Some(b"tls-exporter"));
        assert_ne!(a, b);
    }
}
