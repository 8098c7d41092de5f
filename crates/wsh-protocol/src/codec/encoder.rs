//! Canonical encoder: smallest head form for integers, fixed 8-byte floats,
//! UTF-8 text, and byte strings distinct from text strings (§4.1).

use super::tag;
use super::value::Value;

/// Encode `value` into its canonical byte representation.
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value);
    buf
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::UInt(v) => write_int(buf, tag::UINT, *v),
        Value::Int(v) => write_int(buf, tag::INT, super::value::zigzag(*v)),
        Value::Float(v) => {
            buf.push(tag::FLOAT);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Bytes(v) => write_len_prefixed(buf, tag::BYTES, v),
        Value::Text(v) => write_len_prefixed(buf, tag::TEXT, v.as_bytes()),
        Value::Array(items) => {
            buf.push(tag::ARRAY);
            buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(fields) => {
            buf.push(tag::MAP);
            buf.extend_from_slice(&(fields.len() as u32).to_be_bytes());
            for (key, val) in fields {
                write_value(buf, &Value::Text(key.clone()));
                write_value(buf, val);
            }
        }
        Value::Bool(v) => {
            buf.push(tag::BOOL);
            buf.push(u8::from(*v));
        }
        Value::Null => buf.push(tag::NULL),
    }
}

fn write_int(buf: &mut Vec<u8>, head: u8, raw: u64) {
    let class = tag::size_class_for(raw);
    buf.push(head);
    buf.push(class);
    let len = tag::size_class_len(class);
    let full = raw.to_be_bytes();
    buf.extend_from_slice(&full[8 - len..]);
}

fn write_len_prefixed(buf: &mut Vec<u8>, head: u8, data: &[u8]) {
    buf.push(head);
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    #[test]
    fn uint_uses_smallest_head_form() {
        assert_eq!(encode(&Value::UInt(5)).len(), 3); // tag + class + 1 byte
        assert_eq!(encode(&Value::UInt(1000)).len(), 4); // tag + class + 2 bytes
        assert_eq!(encode(&Value::UInt(u64::MAX)).len(), 10);
    }

    #[test]
    fn roundtrip_every_shape() {
        let values = vec![
            Value::UInt(0),
            Value::UInt(u64::MAX),
            Value::Int(-1),
            Value::Int(i64::MIN),
            Value::Float(1.5),
            Value::Bytes(vec![1, 2, 3]),
            Value::Text("hi".to_string()),
            Value::Array(vec![Value::UInt(1), Value::Bool(true)]),
            Value::map(vec![("a", Value::Null)]),
            Value::Bool(false),
            Value::Null,
        ];
        for v in values {
            let bytes = encode(&v);
            let (decoded, rest) = decode(&bytes).unwrap().unwrap();
            assert_eq!(decoded, v);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn bytes_and_text_are_distinct_on_the_wire() {
        let bytes_encoded = encode(&Value::Bytes(b"hi".to_vec()));
        let text_encoded = encode(&Value::Text("hi".to_string()));
        assert_ne!(bytes_encoded[0], text_encoded[0]);
    }

    #[test]
    fn map_preserves_field_order() {
        let v = Value::map(vec![("z", Value::UInt(1)), ("a", Value::UInt(2))]);
        let bytes = encode(&v);
        let (decoded, _) = decode(&bytes).unwrap().unwrap();
        match decoded {
            Value::Map(fields) => {
                assert_eq!(fields[0].0, "z");
                assert_eq!(fields[1].0, "a");
            }
            _ => panic!("expected map"),
        }
    }
}
