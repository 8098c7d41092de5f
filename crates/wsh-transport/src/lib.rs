//! Transport abstraction for the wsh protocol (§4.4): a connected,
//! multiplexed channel to one peer, selected by URL scheme between a native
//! multi-stream (QUIC) implementation and a single-socket (WebSocket)
//! virtual-stream multiplexer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod factory;
pub mod native;
pub mod single_socket;
pub mod transport;

pub use error::TransportError;
pub use factory::{connect, kind_for_url, TransportKind};
pub use native::NativeTransport;
pub use single_socket::SingleSocketTransport;
pub use transport::{EventSink, StateCell, StreamHalves, Transport, TransportState};
