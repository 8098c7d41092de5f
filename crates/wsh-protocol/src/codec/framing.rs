//! Length-prefix record framing for control records (§4.1): `[4-byte BE
//! length][payload]`, where `payload` is itself a canonical encoded value.

use super::value::{self, Value};
use crate::error::CodecError;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Ceiling on a single record's payload length, guarding against a corrupt or
/// hostile length prefix forcing an unbounded buffer allocation.
pub const MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

/// Streaming length-prefix record decoder.
///
/// Wraps the value decoder with the outer `[length][payload]` framing used
/// for control records. Carries leftover bytes across `feed` calls the same
/// way [`super::Decoder`] does.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    residue: Vec<u8>,
}

impl FrameDecoder {
    /// Create a fresh frame decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every complete record decoded so far.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthExceeded`] if a declared record length
    /// exceeds [`MAX_RECORD_LEN`], or any decode error the inner value parser
    /// raises on a malformed payload.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Value>, CodecError> {
        self.residue.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let remaining = &self.residue[offset..];
            if remaining.len() < LENGTH_PREFIX_SIZE {
                break;
            }
            let len = u32::from_be_bytes([
                remaining[0],
                remaining[1],
                remaining[2],
                remaining[3],
            ]);
            if len > MAX_RECORD_LEN {
                return Err(CodecError::LengthExceeded {
                    len: len as usize,
                    max: MAX_RECORD_LEN as usize,
                });
            }
            let len = len as usize;
            if remaining.len() < LENGTH_PREFIX_SIZE + len {
                break;
            }
            let payload = &remaining[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len];
            let (value, consumed) = match value::decode_one(payload)? {
                Some(v) => v,
                None => return Err(CodecError::Truncated { needed: len }),
            };
            if consumed != len {
                return Err(CodecError::Truncated { needed: len - consumed });
            }
            records.push(value);
            offset += LENGTH_PREFIX_SIZE + len;
        }
        self.residue.drain(..offset);
        Ok(records)
    }
}

/// Encode `value` as a length-prefixed record ready to write to a socket.
#[must_use]
pub fn encode_record(value: &Value) -> Vec<u8> {
    let payload = super::encoder::encode(value);
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(&payload);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_one_record() {
        let record = Value::map(vec![("opcode", Value::UInt(1))]);
        let framed = encode_record(&record);
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(&framed).unwrap();
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn splits_across_the_length_prefix() {
        let record = Value::Text("a record".to_string());
        let framed = encode_record(&record);
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&framed[..2]).unwrap().is_empty());
        assert!(decoder.feed(&framed[2..5]).unwrap().is_empty());
        let records = decoder.feed(&framed[5..]).unwrap();
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn two_records_back_to_back() {
        let mut framed = encode_record(&Value::UInt(1));
        framed.extend(encode_record(&Value::UInt(2)));
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(&framed).unwrap();
        assert_eq!(records, vec![Value::UInt(1), Value::UInt(2)]);
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut framed = Vec::new();
        framed.extend_from_slice(&(MAX_RECORD_LEN + 1).to_be_bytes());
        let mut decoder = FrameDecoder::new();
        let err = decoder.feed(&framed).unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthExceeded {
                len: (MAX_RECORD_LEN + 1) as usize,
                max: MAX_RECORD_LEN as usize,
            }
        );
    }

    #[test]
    fn trailing_garbage_after_value_is_truncation_error() {
        let mut framed = Vec::new();
        let payload = super::super::encoder::encode(&Value::Null);
        framed.extend_from_slice(&((payload.len() + 3) as u32).to_be_bytes());
        framed.extend_from_slice(&payload);
        framed.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&framed).is_err());
    }
}
