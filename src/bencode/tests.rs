use super::*;
use bytes::Bytes;

#[test]
fn decode_integer() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-7e").unwrap(), Value::Integer(-7));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn decode_integer_rejects_leading_zeros() {
    assert!(matches!(
        decode(b"i007e"),
        Err(BencodeError::InvalidInteger(_))
    ));
    assert!(matches!(
        decode(b"i-0e"),
        Err(BencodeError::InvalidInteger(_))
    ));
    assert!(matches!(decode(b"ie"), Err(BencodeError::InvalidInteger(_))));
}

#[test]
fn decode_integer_rejects_overflow() {
    assert!(matches!(
        decode(b"i9223372036854775808e"),
        Err(BencodeError::InvalidInteger(_))
    ));
}

#[test]
fn decode_bytes() {
    assert_eq!(decode(b"5:hello").unwrap(), Value::string("hello"));
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::new()));
}

#[test]
fn decode_truncated() {
    assert!(matches!(decode(b"5:hel"), Err(BencodeError::UnexpectedEof)));
    assert!(matches!(decode(b"i42"), Err(BencodeError::UnexpectedEof)));
    assert!(matches!(decode(b"li1e"), Err(BencodeError::UnexpectedEof)));
    assert!(matches!(decode(b""), Err(BencodeError::UnexpectedEof)));
}

#[test]
fn decode_list() {
    let list = decode(b"li1ei2ei3ee").unwrap();
    assert_eq!(list.as_list().unwrap().len(), 3);

    let empty = decode(b"le").unwrap();
    assert_eq!(empty, Value::List(vec![]));
}

#[test]
fn decode_dict() {
    let dict = decode(b"d3:agei30e4:name5:Alicee").unwrap();
    assert_eq!(dict.get(b"name").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(dict.get(b"age").and_then(|v| v.as_integer()), Some(30));

    let empty = decode(b"de").unwrap();
    assert!(empty.as_dict().unwrap().is_empty());
}

#[test]
fn decode_dict_rejects_unsorted_keys() {
    assert!(matches!(
        decode(b"d1:b0:1:a0:e"),
        Err(BencodeError::UnsortedKey)
    ));
}

#[test]
fn decode_dict_rejects_duplicate_keys() {
    assert!(matches!(
        decode(b"d1:a0:1:a0:e"),
        Err(BencodeError::DuplicateKey)
    ));
}

#[test]
fn decode_dict_rejects_non_string_keys() {
    assert!(matches!(decode(b"di1e0:e"), Err(BencodeError::InvalidKey)));
}

#[test]
fn decode_trailing_data() {
    assert!(matches!(
        decode(b"i42eextra"),
        Err(BencodeError::TrailingData)
    ));
}

#[test]
fn decode_depth_limit() {
    let mut deep = Vec::new();
    deep.extend(std::iter::repeat_n(b'l', 100));
    deep.extend(std::iter::repeat_n(b'e', 100));
    assert!(matches!(decode(&deep), Err(BencodeError::NestingTooDeep)));
}

#[test]
fn encode_canonical_key_order() {
    let dict = Value::dict([("b", Value::Integer(2)), ("a", Value::string("x"))]);
    assert_eq!(encode(&dict), b"d1:a1:x1:bi2ee");

    // Insertion order must not matter.
    let dict = Value::dict([("a", Value::string("x")), ("b", Value::Integer(2))]);
    assert_eq!(encode(&dict), b"d1:a1:x1:bi2ee");
}

#[test]
fn encode_decode_roundtrip() {
    let inputs: &[&[u8]] = &[
        b"i42e",
        b"i-1e",
        b"0:",
        b"5:hello",
        b"le",
        b"de",
        b"l5:helloi42eld2:hii1eeee",
        b"d6:lengthi12345e4:name9:hello.txt12:piece lengthi16384e6:pieces0:e",
    ];

    for input in inputs {
        let value = decode(input).unwrap();
        assert_eq!(&encode(&value), input);
    }
}

#[test]
fn decode_binary_strings() {
    // Byte strings are raw bytes, not text.
    let mut input = b"3:".to_vec();
    input.extend_from_slice(&[0x00, 0xff, 0x80]);
    let value = decode(&input).unwrap();
    assert_eq!(
        value.as_bytes().unwrap().as_ref(),
        &[0x00, 0xff, 0x80][..]
    );
    assert_eq!(value.as_str(), None);
}
