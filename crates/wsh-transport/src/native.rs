//! Native multi-stream transport (§4.4), backed by QUIC.
//!
//! On connect, the client opens the first bidirectional stream as the
//! control stream: control records are length-prefix-framed (§4.1) and
//! written to its outbound half, and inbound bytes are fed to a streaming
//! [`FrameDecoder`] whose yields dispatch to [`EventSink::on_control`].
//! Additional streams, peer-initiated or locally opened, carry raw bytes
//! without framing.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use quinn::{ClientConfig, Endpoint};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use url::Url;
use wsh_protocol::codec::{self, FrameDecoder};
use wsh_protocol::Value;

use crate::error::TransportError;
use crate::transport::{EventSink, StateCell, StreamHalves, Transport, TransportState};

/// The native (QUIC) transport implementation.
pub struct NativeTransport {
    state: Arc<StateCell>,
    connection: quinn::Connection,
    control_send: Arc<Mutex<quinn::SendStream>>,
}

impl NativeTransport {
    /// Connect to `url` (scheme `https`) over QUIC and wire `sink` for inbound events.
    ///
    /// # Errors
    /// [`TransportError::InvalidUrl`] if `url` has no host, or
    /// [`TransportError::ConnectionFailed`] if the QUIC handshake fails.
    pub async fn connect(url: &str, sink: Arc<dyn EventSink>) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl("missing host".to_string()))?
            .to_string();
        let port = parsed.port().unwrap_or(443);

        let state = Arc::new(StateCell::new(TransportState::Connecting));

        let client_config = client_config()?;
        let mut endpoint = Endpoint::client("0.0.0.0:0".parse::<SocketAddr>().unwrap())
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        endpoint.set_default_client_config(client_config);

        let remote: SocketAddr = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(TransportError::Io)?
            .next()
            .ok_or_else(|| TransportError::ConnectionFailed(format!("could not resolve {host}")))?;

        let connecting = endpoint
            .connect(remote, &host)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let connection = connecting
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (control_send, control_recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        state.set(TransportState::Connected);

        tokio::spawn(control_recv_loop(
            control_recv,
            Arc::clone(&state),
            connection.clone(),
            Arc::clone(&sink),
        ));
        tokio::spawn(peer_stream_loop(
            connection.clone(),
            Arc::clone(&state),
            sink,
        ));

        Ok(NativeTransport {
            state,
            connection,
            control_send: Arc::new(Mutex::new(control_send)),
        })
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        match self.state.get() {
            TransportState::Connected => Ok(()),
            _ => Err(TransportError::NotConnected),
        }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    fn state(&self) -> TransportState {
        self.state.get()
    }

    async fn send_control(&self, record: &Value) -> Result<(), TransportError> {
        self.require_connected()?;
        let framed = codec::encode_record(record);
        let mut send = self.control_send.lock().await;
        send.write_all(&framed).await.map_err(TransportError::Io)
    }

    async fn open_stream(&self) -> Result<StreamHalves, TransportError> {
        self.require_connected()?;
        let (send, recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let stream_id = send.id().index();
        Ok(StreamHalves {
            inbound: Box::pin(recv),
            outbound: Box::pin(send),
            stream_id: stream_id as u32,
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.state.get() == TransportState::Closed {
            return Ok(());
        }
        self.state.set(TransportState::Closed);
        self.connection.close(0u32.into(), b"closed");
        Ok(())
    }
}

async fn control_recv_loop(
    mut control_recv: quinn::RecvStream,
    state: Arc<StateCell>,
    connection: quinn::Connection,
    sink: Arc<dyn EventSink>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 8192];
    loop {
        match control_recv.read(&mut buf).await {
            Ok(Some(n)) if n > 0 => match decoder.feed(&buf[..n]) {
                Ok(records) => {
                    for record in records {
                        sink.on_control(record).await;
                    }
                }
                Err(e) => {
                    finish(&state, &connection, &sink, Some(TransportError::Codec(e))).await;
                    return;
                }
            },
            Ok(_) => {
                finish(&state, &connection, &sink, None).await;
                return;
            }
            Err(e) => {
                finish(&state, &connection, &sink, Some(TransportError::Io(e.into()))).await;
                return;
            }
        }
    }
}

async fn peer_stream_loop(connection: quinn::Connection, state: Arc<StateCell>, sink: Arc<dyn EventSink>) {
    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let stream_id = send.id().index() as u32;
                sink.on_stream_open(StreamHalves {
                    inbound: Box::pin(recv),
                    outbound: Box::pin(send),
                    stream_id,
                })
                .await;
            }
            Err(_) => {
                if state.get() != TransportState::Closed {
                    finish(&state, &connection, &sink, None).await;
                }
                return;
            }
        }
    }
}

async fn finish(
    state: &Arc<StateCell>,
    connection: &quinn::Connection,
    sink: &Arc<dyn EventSink>,
    error: Option<TransportError>,
) {
    if state.get() == TransportState::Closed {
        return;
    }
    state.set(TransportState::Closed);
    connection.close(0u32.into(), b"closed");
    if let Some(err) = error {
        sink.on_error(err).await;
    }
    sink.on_close().await;
}

fn client_config() -> Result<ClientConfig, TransportError> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
    };
    let crypto = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    Ok(ClientConfig::new(Arc::new(quic_crypto)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_state() -> Arc<StateCell> {
        Arc::new(StateCell::new(TransportState::Connecting))
    }

    #[test]
    fn state_transitions_to_closed_is_idempotent() {
        let state = noop_state();
        state.set(TransportState::Closed);
        assert_eq!(state.get(), TransportState::Closed);
        state.set(TransportState::Closed);
        assert_eq!(state.get(), TransportState::Closed);
    }
}
