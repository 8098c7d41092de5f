//! # wsh-protocol
//!
//! Binary wire codec and schema-derived message surface for the wsh protocol.
//!
//! This crate provides:
//! - **Codec**: the canonical object model (`Value`), its encoder/decoder, and the
//!   length-prefix framing used for control records.
//! - **Messages**: the opcode enum, per-record payload types, and the `Envelope`
//!   wire wrapper — generated from `schema/wsh-v1.yaml` (see [`messages`]).
//!
//! ## Quick Start
//!
//! ```
//! use wsh_protocol::{Value, codec};
//!
//! let value = Value::Text("hello".to_string());
//! let bytes = codec::encode(&value);
//! let (decoded, rest) = codec::decode(&bytes).unwrap().unwrap();
//! assert_eq!(decoded, value);
//! assert!(rest.is_empty());
//! ```
//!
//! ## Module Structure
//!
//! - [`codec`]: canonical value encoding, streaming decoder, length-prefix framing
//! - [`messages`]: generated opcode constants and record payload types
//! - [`error`]: error types for codec and schema validation failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;

#[path = "messages.gen.rs"]
pub mod messages;

pub use codec::Value;
pub use error::{CodecError, SchemaError};
pub use messages::{Envelope, MsgType, Payload, PROTOCOL_VERSION};

/// Big-endian length-prefix size used by control record framing (§4.1).
pub const FRAME_LENGTH_PREFIX_SIZE: usize = 4;
