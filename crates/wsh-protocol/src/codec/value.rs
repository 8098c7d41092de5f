//! The language-neutral value set of §3: the in-memory object model shared by
//! the encoder and decoder.

use super::tag;
use crate::error::CodecError;

/// A decoded (or to-be-encoded) wire value.
///
/// Mirrors the object model in §3: unsigned and signed integers, floats,
/// byte strings distinct from text strings, ordered arrays, string-keyed
/// maps, booleans, and null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    UInt(u64),
    /// Signed integer.
    Int(i64),
    /// Floating point (always round-tripped as `f64`).
    Float(f64),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text string.
    Text(String),
    /// Ordered array of values.
    Array(Vec<Value>),
    /// String-keyed map. A `Vec` of pairs, not a `HashMap`: encoders MUST
    /// emit deterministic field order per record definition, and preserving
    /// insertion order here is what makes that possible.
    Map(Vec<(String, Value)>),
    /// Boolean.
    Bool(bool),
    /// Null.
    Null,
}

impl Value {
    /// Convenience constructor for a map built from an ordered field list.
    #[must_use]
    pub fn map(fields: Vec<(&str, Value)>) -> Self {
        Value::Map(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Look up a field in a `Map` value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Extract a `u64` from `UInt`, if this value is one.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract an `i64` from `Int`, if this value is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract an `f64` from `Float`, if this value is one.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a `&[Value]` from `Array`, if this value is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Extract a `&str` from `Text`, if this value is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Extract a `&[u8]` from `Bytes`, if this value is one.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Extract a `bool` from `Bool`, if this value is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract the field list from `Map`, if this value is one.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

fn read_be(data: &[u8], class: u8) -> Option<u64> {
    let len = tag::size_class_len(class);
    if data.len() < len {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[8 - len..].copy_from_slice(&data[..len]);
    Some(u64::from_be_bytes(buf))
}

fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Attempt to decode one value from the head of `data`.
///
/// Returns `Ok(None)` when more bytes are needed, `Ok(Some((value,
/// consumed)))` on success.
pub(super) fn decode_one(data: &[u8]) -> Result<Option<(Value, usize)>, CodecError> {
    let Some(&head) = data.first() else {
        return Ok(None);
    };

    match head {
        tag::UINT | tag::INT => {
            let Some(&class) = data.get(1) else {
                return Ok(None);
            };
            let Some(raw) = read_be(&data[2..], class) else {
                return Ok(None);
            };
            let consumed = 2 + tag::size_class_len(class);
            let value = if head == tag::UINT {
                Value::UInt(raw)
            } else {
                Value::Int(zigzag_decode(raw))
            };
            Ok(Some((value, consumed)))
        }
        tag::FLOAT => {
            if data.len() < 9 {
                return Ok(None);
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[1..9]);
            Ok(Some((Value::Float(f64::from_be_bytes(buf)), 9)))
        }
        tag::BYTES | tag::TEXT => {
            if data.len() < 5 {
                return Ok(None);
            }
            let len = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
            if data.len() < 5 + len {
                return Ok(None);
            }
            let raw = &data[5..5 + len];
            let value = if head == tag::BYTES {
                Value::Bytes(raw.to_vec())
            } else {
                Value::Text(
                    std::str::from_utf8(raw)
                        .map_err(|_| CodecError::InvalidUtf8)?
                        .to_string(),
                )
            };
            Ok(Some((value, 5 + len)))
        }
        tag::ARRAY => {
            if data.len() < 5 {
                return Ok(None);
            }
            let count = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
            let mut offset = 5;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                match decode_one(&data[offset..])? {
                    Some((item, consumed)) => {
                        items.push(item);
                        offset += consumed;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Value::Array(items), offset)))
        }
        tag::MAP => {
            if data.len() < 5 {
                return Ok(None);
            }
            let count = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
            let mut offset = 5;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let (key, key_consumed) = match decode_one(&data[offset..])? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                let key = match key {
                    Value::Text(s) => s,
                    _ => return Err(CodecError::NonStringMapKey),
                };
                offset += key_consumed;
                let (val, val_consumed) = match decode_one(&data[offset..])? {
                    Some(v) => v,
                    None => return Ok(None),
                };
                offset += val_consumed;
                fields.push((key, val));
            }
            Ok(Some((Value::Map(fields), offset)))
        }
        tag::BOOL => match data.get(1) {
            Some(0) => Ok(Some((Value::Bool(false), 2))),
            Some(1) => Ok(Some((Value::Bool(true), 2))),
            Some(_) => Err(CodecError::UnknownMajorType(head)),
            None => Ok(None),
        },
        tag::NULL => Ok(Some((Value::Null, 1))),
        other => Err(CodecError::UnknownMajorType(other)),
    }
}

pub(super) fn zigzag(v: i64) -> u64 {
    zigzag_encode(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_roundtrip() {
        for v in [0i64, 1, -1, 42, -42, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn get_missing_field() {
        let v = Value::map(vec![("a", Value::UInt(1))]);
        assert!(v.get("b").is_none());
        assert_eq!(v.get("a").and_then(Value::as_uint), Some(1));
    }
}
