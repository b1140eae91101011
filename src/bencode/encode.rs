use super::value::Value;

/// Canonically encodes a bencode value.
///
/// Dictionary keys are emitted in ascending raw-byte order (guaranteed by
/// the `BTreeMap` representation), integers without padding, and byte
/// strings as raw bytes. The SHA-1 of the encoding of an `info` dictionary
/// is its info-hash, so two dictionaries with the same entries always encode
/// to identical bytes.
///
/// # Examples
///
/// ```
/// use btspider::bencode::{encode, Value};
///
/// let dict = Value::dict([("b", Value::Integer(2)), ("a", Value::string("x"))]);
/// assert_eq!(encode(&dict), b"d1:a1:x1:bi2ee");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    encode_into(value, &mut buf);
    buf
}

fn encode_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Integer(i) => {
            buf.push(b'i');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.push(b'e');
        }
        Value::Bytes(b) => {
            buf.extend_from_slice(b.len().to_string().as_bytes());
            buf.push(b':');
            buf.extend_from_slice(b);
        }
        Value::List(items) => {
            buf.push(b'l');
            for item in items {
                encode_into(item, buf);
            }
            buf.push(b'e');
        }
        Value::Dict(map) => {
            buf.push(b'd');
            for (key, val) in map {
                buf.extend_from_slice(key.len().to_string().as_bytes());
                buf.push(b':');
                buf.extend_from_slice(key);
                encode_into(val, buf);
            }
            buf.push(b'e');
        }
    }
}
