//! Transport-layer errors.

use std::io;

use wsh_protocol::CodecError;

/// Errors raised by a [`crate::Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from the underlying socket or QUIC connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport is not in the `connected` state required for this operation.
    #[error("transport is not connected")]
    NotConnected,

    /// The transport has transitioned to `closed`.
    #[error("transport is closed")]
    Closed,

    /// `connect` failed to reach or negotiate with the peer.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connect URL's scheme or structure was not recognized.
    #[error("invalid transport URL: {0}")]
    InvalidUrl(String),

    /// A control record failed to decode or exceeded the frame size limit.
    #[error("control record codec error: {0}")]
    Codec(#[from] CodecError),

    /// The single-socket multiplexer received a frame with an unknown frame type byte.
    #[error("unknown frame type byte: {0:#04x}")]
    UnknownFrameType(u8),

    /// The single-socket multiplexer received a `DATA`/`CLOSE_STREAM` frame for a stream id
    /// that was never opened.
    #[error("frame referenced unknown stream id {0}")]
    UnknownStreamId(u32),

    /// The underlying WebSocket connection failed.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The underlying QUIC connection failed.
    #[error("quic error: {0}")]
    Quic(String),
}
