//! URL-scheme-based transport selection (§4.4).
//!
//! `https://` selects the native multi-stream (QUIC) transport; `ws://`,
//! `wss://`, and `wsh://` select the single-socket (WebSocket) virtual-stream
//! multiplexer.

use std::sync::Arc;

use url::Url;

use crate::error::TransportError;
use crate::native::NativeTransport;
use crate::single_socket::SingleSocketTransport;
use crate::transport::{EventSink, Transport};

/// Which implementation a URL scheme resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// `https://` — native multi-stream transport.
    Native,
    /// `ws://` / `wss://` / `wsh://` — single-socket virtual-stream multiplexer.
    SingleSocket,
}

/// Resolve `url`'s scheme to a [`TransportKind`].
///
/// # Errors
/// [`TransportError::InvalidUrl`] if the URL fails to parse or its scheme is
/// not one of `https`, `ws`, `wss`, `wsh`.
pub fn kind_for_url(url: &str) -> Result<TransportKind, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "https" => Ok(TransportKind::Native),
        "ws" | "wss" | "wsh" => Ok(TransportKind::SingleSocket),
        other => Err(TransportError::InvalidUrl(format!(
            "unsupported scheme `{other}`"
        ))),
    }
}

/// Connect to `url`, selecting the transport implementation by scheme and
/// wiring `sink` for inbound events.
///
/// # Errors
/// Propagates [`TransportError::InvalidUrl`] for an unrecognized scheme, or
/// whatever the selected implementation's `connect` returns.
pub async fn connect(
    url: &str,
    sink: Arc<dyn EventSink>,
) -> Result<Arc<dyn Transport>, TransportError> {
    match kind_for_url(url)? {
        TransportKind::Native => {
            let transport = NativeTransport::connect(url, sink).await?;
            Ok(Arc::new(transport))
        }
        TransportKind::SingleSocket => {
            // `wsh://` is a spec-level alias (§6) for `wss://`; the underlying WebSocket
            // library only recognizes `ws`/`wss`, so normalize before handing off the URL.
            let normalized = normalize_wsh_scheme(url);
            let transport = SingleSocketTransport::connect(&normalized, sink).await?;
            Ok(Arc::new(transport))
        }
    }
}

/// Rewrite a `wsh://` URL to `wss://`; any other scheme passes through unchanged.
fn normalize_wsh_scheme(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("wsh") => format!("wss://{rest}"),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_selects_native() {
        assert_eq!(kind_for_url("https://host:443").unwrap(), TransportKind::Native);
    }

    #[test]
    fn ws_and_wss_and_wsh_select_single_socket() {
        for url in ["ws://host", "wss://host", "wsh://host"] {
            assert_eq!(kind_for_url(url).unwrap(), TransportKind::SingleSocket);
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            kind_for_url("ftp://host"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn unparseable_url_is_rejected() {
        assert!(matches!(kind_for_url("not a url"), Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn wsh_scheme_is_normalized_to_wss() {
        assert_eq!(normalize_wsh_scheme("wsh://host:9001/path"), "wss://host:9001/path");
        assert_eq!(normalize_wsh_scheme("WSH://host"), "wss://host");
    }

    #[test]
    fn non_wsh_schemes_pass_through_unchanged() {
        assert_eq!(normalize_wsh_scheme("ws://host"), "ws://host");
        assert_eq!(normalize_wsh_scheme("wss://host"), "wss://host");
        assert_eq!(normalize_wsh_scheme("https://host"), "https://host");
    }
}
