//! Binary object model: canonical encoding, streaming decoding, and
//! length-prefix framing for control records (§4.1).
//!
//! Follows the manual byte-slicing idiom used throughout this codebase's wire
//! formats: no `bytes`/`tokio_util::codec` dependency, just big-endian
//! `to_be_bytes`/`from_be_bytes` and explicit bounds checks.

mod decoder;
mod encoder;
mod framing;
mod tag;
mod value;

pub use decoder::{DecodeOutcome, Decoder};
pub use encoder::encode;
pub use framing::{encode_record, FrameDecoder};
pub use value::Value;

use crate::error::CodecError;

/// Decode a single canonical value from the head of `data`.
///
/// Returns `Ok(None)` if `data` does not yet contain a complete value (the
/// caller should feed more bytes), `Ok(Some((value, rest)))` on success, or an
/// error for malformed input.
pub fn decode(data: &[u8]) -> Result<Option<(Value, &[u8])>, CodecError> {
    match value::decode_one(data)? {
        Some((value, consumed)) => Ok(Some((value, &data[consumed..]))),
        None => Ok(None),
    }
}
