//! Client and session errors.

use wsh_protocol::{CodecError, SchemaError};
use wsh_transport::TransportError;

/// Errors raised by a [`crate::session::Session`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested state transition is not allowed from the current state.
    #[error("invalid session state transition")]
    InvalidTransition,

    /// An operation was attempted on a channel that is not open.
    #[error("channel {0} is not open")]
    NotOpen(u32),

    /// `resize` was called on a non-`pty` channel.
    #[error("resize is only valid for pty channels")]
    NotAPty,

    /// The control-action channel to the owning [`crate::client::Client`] is gone.
    #[error("client control channel closed")]
    ClientGone,

    /// The underlying byte stream failed.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by [`crate::client::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A waiter-backed operation did not receive its expected response in time.
    #[error("operation timed out")]
    Timeout,

    /// The server rejected authentication.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The server responded with an unexpected message type for the current step.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected a channel-level operation.
    #[error("channel error: {0}")]
    Channel(String),

    /// The client is not connected (or has already disconnected).
    #[error("client is not connected")]
    NotConnected,

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A control record failed to decode or did not match its declared schema.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A control record's opcode or field shape was invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A session-level operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A key store operation failed (pubkey auth, reverse mode registration).
    #[error(transparent)]
    KeyStore(#[from] wsh_crypto::KeyStoreError),

    /// A cryptographic operation failed (signing, transcript verification).
    #[error(transparent)]
    Crypto(#[from] wsh_crypto::CryptoError),
}
