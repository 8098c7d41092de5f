//! Streaming decoder: consumers feed byte chunks in, the decoder returns zero
//! or more complete decoded values per feed and carries leftover bytes across
//! calls (§4.1).

use super::value::{self, Value};
use crate::error::CodecError;

/// What [`Decoder::feed`] produced for one call.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Every value fully decoded by this call (zero or more).
    pub values: Vec<Value>,
}

/// A streaming decoder over the canonical object model.
///
/// Holds a residue buffer of bytes seen so far but not yet forming a complete
/// value. `feed` never blocks and never panics on truncated input — it
/// simply accumulates until enough bytes arrive.
#[derive(Debug, Default)]
pub struct Decoder {
    residue: Vec<u8>,
}

impl Decoder {
    /// Create a fresh decoder with an empty residue buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every value completed by this call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] on malformed input (unknown major type, bad
    /// UTF-8, non-string map key). Truncation is never an error here — it
    /// just means no further progress until more bytes arrive.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<DecodeOutcome, CodecError> {
        self.residue.extend_from_slice(chunk);

        let mut values = Vec::new();
        let mut offset = 0;
        loop {
            match value::decode_one(&self.residue[offset..])? {
                Some((val, consumed)) => {
                    values.push(val);
                    offset += consumed;
                }
                None => break,
            }
        }
        self.residue.drain(..offset);
        Ok(DecodeOutcome { values })
    }

    /// Number of residue bytes currently buffered (not yet a complete value).
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.residue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    #[test]
    fn feeds_in_one_shot() {
        let encoded = encode(&Value::Text("hello".to_string()));
        let mut decoder = Decoder::new();
        let outcome = decoder.feed(&encoded).unwrap();
        assert_eq!(outcome.values, vec![Value::Text("hello".to_string())]);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn feeds_byte_by_byte() {
        let encoded = encode(&Value::Array(vec![Value::UInt(1), Value::UInt(2)]));
        let mut decoder = Decoder::new();
        let mut collected = Vec::new();
        for byte in &encoded {
            let outcome = decoder.feed(&[*byte]).unwrap();
            collected.extend(outcome.values);
        }
        assert_eq!(
            collected,
            vec![Value::Array(vec![Value::UInt(1), Value::UInt(2)])]
        );
    }

    #[test]
    fn multiple_values_in_one_feed() {
        let mut bytes = encode(&Value::Bool(true));
        bytes.extend(encode(&Value::Bool(false)));
        let mut decoder = Decoder::new();
        let outcome = decoder.feed(&bytes).unwrap();
        assert_eq!(outcome.values, vec![Value::Bool(true), Value::Bool(false)]);
    }

    #[test]
    fn chunk_split_matches_whole_buffer() {
        let mut bytes = Vec::new();
        for i in 0..20u64 {
            bytes.extend(encode(&Value::UInt(i)));
        }

        let mut whole = Decoder::new();
        let all_at_once = whole.feed(&bytes).unwrap().values;

        for split in [1, 3, 7, 16] {
            let mut chunked = Decoder::new();
            let mut collected = Vec::new();
            for chunk in bytes.chunks(split) {
                collected.extend(chunked.feed(chunk).unwrap().values);
            }
            assert_eq!(collected, all_at_once);
        }
    }

    #[test]
    fn unknown_major_type_errors() {
        let mut decoder = Decoder::new();
        let err = decoder.feed(&[0xFF]).unwrap_err();
        assert_eq!(err, CodecError::UnknownMajorType(0xFF));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                any::<u64>().prop_map(Value::UInt),
                any::<i64>().prop_map(Value::Int),
                any::<f64>().prop_map(Value::Float),
                prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
                "[a-z]{0,16}".prop_map(Value::Text),
                any::<bool>().prop_map(Value::Bool),
                Just(Value::Null),
            ];
            leaf.prop_recursive(3, 32, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::vec(("[a-z]{1,8}", inner), 0..4)
                        .prop_map(|fields| Value::Map(fields.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn prop_roundtrip(value in arb_value()) {
                let bytes = crate::codec::encode(&value);
                let mut decoder = Decoder::new();
                let outcome = decoder.feed(&bytes).unwrap();
                prop_assert_eq!(outcome.values, vec![value]);
                prop_assert_eq!(decoder.pending_bytes(), 0);
            }

            #[test]
            fn prop_chunking_is_order_independent(
                values in prop::collection::vec(arb_value(), 1..8),
                split in 1usize..13
            ) {
                let mut bytes = Vec::new();
                for v in &values {
                    bytes.extend(crate::codec::encode(v));
                }

                let mut whole = Decoder::new();
                let all_at_once = whole.feed(&bytes).unwrap().values;

                let mut chunked = Decoder::new();
                let mut collected = Vec::new();
                for chunk in bytes.chunks(split) {
                    collected.extend(chunked.feed(chunk).unwrap().values);
                }
                prop_assert_eq!(collected, all_at_once);
            }
        }
    }
}
