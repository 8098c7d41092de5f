//! # wsh-client
//!
//! The client-side orchestrator for the wsh protocol (§4.6): connect and
//! authenticate, open and manage channels, keep the connection alive, and
//! drive the higher-level flows (reverse mode, file transfer, remote tools)
//! built on top of the control channel.
//!
//! ## Module Structure
//!
//! - [`client`]: [`Client`], [`ConnectConfig`], [`Credentials`], [`ClientEventSink`]
//! - [`session`]: [`Session`], the per-channel read/write/resize/signal/close handle
//! - [`waiter`]: the request/response waiter table backing every waited-for operation
//! - [`error`]: [`ClientError`] and [`SessionError`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod session;
pub mod waiter;

pub use client::{Client, ClientEventSink, ConnectConfig, Credentials, NullEventSink};
pub use error::{ClientError, SessionError};
pub use session::{ChannelKind, Session};
