//! The `Transport` contract (§4.4): a connected, multiplexed channel to one peer.
//!
//! Each implementation exposes `close`, `send_control`, and `open_stream`, and
//! delivers inbound events — control records, peer-opened streams, closure,
//! and errors — to an [`EventSink`] supplied at construction, rather than via
//! mutable callback slots on the transport itself.

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use wsh_protocol::Value;

use crate::error::TransportError;

/// `disconnected → connecting → connected → closed`. `send_control` and
/// `open_stream` require `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    /// Not yet connected; no background tasks running.
    Disconnected = 0,
    /// `connect` is in progress.
    Connecting = 1,
    /// Connected; control and stream operations are available.
    Connected = 2,
    /// Terminally closed; no further operations succeed.
    Closed = 3,
}

impl TransportState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TransportState::Disconnected,
            1 => TransportState::Connecting,
            2 => TransportState::Connected,
            _ => TransportState::Closed,
        }
    }
}

/// An atomically-stored [`TransportState`], shared between a transport's
/// public handle and its background tasks.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// A fresh cell in the `Disconnected` state.
    #[must_use]
    pub fn new(initial: TransportState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the state unconditionally.
    pub fn set(&self, state: TransportState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// One half of a bidirectional byte stream opened over a [`Transport`],
/// paired with its stream id.
pub struct StreamHalves {
    /// Readable half.
    pub inbound: Pin<Box<dyn AsyncRead + Send>>,
    /// Writable half.
    pub outbound: Pin<Box<dyn AsyncWrite + Send>>,
    /// Stream id, as assigned by the allocating side (§4.4).
    pub stream_id: u32,
}

/// Inbound event delivery for a [`Transport`], supplied at construction.
///
/// Matches the spec's four callbacks — `onControl`, `onStreamOpen`,
/// `onClose`, `onError` — re-expressed as trait methods on an object handed
/// to the transport rather than mutable singleton slots, so the transport
/// itself stays `Send + Sync` without interior mutability for callbacks.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A control record was decoded from the control stream/channel.
    async fn on_control(&self, record: Value);

    /// The peer opened a new stream.
    async fn on_stream_open(&self, stream: StreamHalves);

    /// The transport reached `Closed` without a preceding error.
    async fn on_close(&self);

    /// The transport encountered an error. Always followed by `on_close`.
    async fn on_error(&self, err: TransportError);
}

/// A connected, multiplexed transport to one peer (§4.4).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current state.
    fn state(&self) -> TransportState;

    /// Send a control record on the control stream/channel.
    ///
    /// # Errors
    /// [`TransportError::NotConnected`] if not `Connected`.
    async fn send_control(&self, record: &Value) -> Result<(), TransportError>;

    /// Open a new bidirectional stream, locally initiated.
    ///
    /// # Errors
    /// [`TransportError::NotConnected`] if not `Connected`.
    async fn open_stream(&self) -> Result<StreamHalves, TransportError>;

    /// Close the transport and release resources. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips() {
        let cell = StateCell::new(TransportState::Disconnected);
        assert_eq!(cell.get(), TransportState::Disconnected);
        cell.set(TransportState::Connected);
        assert_eq!(cell.get(), TransportState::Connected);
        cell.set(TransportState::Closed);
        assert_eq!(cell.get(), TransportState::Closed);
    }
}
