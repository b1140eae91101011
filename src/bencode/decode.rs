use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a single bencode value from a byte slice.
///
/// The input must contain exactly one complete value with no trailing data.
/// Dictionaries are validated strictly: keys must be byte strings, unique,
/// and sorted ascending by raw bytes, so any decoded dictionary re-encodes
/// to the input bytes.
///
/// # Errors
///
/// Returns an error on truncated input, malformed integers or lengths,
/// unsorted or duplicated dictionary keys, nesting deeper than 64 levels,
/// or data after the value.
///
/// # Examples
///
/// ```
/// use btspider::bencode::decode;
///
/// let value = decode(b"d4:name8:test.bin6:lengthi512ee");
/// assert!(value.is_err()); // keys out of order
///
/// let value = decode(b"d6:lengthi512e4:name8:test.bine").unwrap();
/// assert_eq!(value.get(b"length").and_then(|v| v.as_integer()), Some(512));
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut reader = Reader { data, pos: 0 };
    let value = reader.value(0)?;

    if reader.pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => Ok(Value::Bytes(self.byte_string()?)),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;

        let start = self.pos;
        while self.peek()? != b'e' {
            self.pos += 1;
        }

        let digits = &self.data[start..self.pos];
        self.pos += 1;

        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::InvalidInteger("non-ascii".into()))?;

        if text.is_empty() || text == "-" {
            return Err(BencodeError::InvalidInteger("empty".into()));
        }

        // "0" is the only value allowed to start with a zero; "-0" never is.
        if text.starts_with("-0") || (text.len() > 1 && text.starts_with('0')) {
            return Err(BencodeError::InvalidInteger("leading zeros".into()));
        }

        let value: i64 = text
            .parse()
            .map_err(|_| BencodeError::InvalidInteger(text.into()))?;

        Ok(Value::Integer(value))
    }

    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let start = self.pos;
        while self.peek()? != b':' {
            if !self.data[self.pos].is_ascii_digit() {
                return Err(BencodeError::InvalidStringLength);
            }
            self.pos += 1;
        }

        let len: usize = std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        self.pos += 1;

        let end = self
            .pos
            .checked_add(len)
            .ok_or(BencodeError::InvalidStringLength)?;
        if end > self.data.len() {
            return Err(BencodeError::UnexpectedEof);
        }

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;

        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut map = BTreeMap::new();
        let mut last_key: Option<Bytes> = None;

        while self.peek()? != b'e' {
            if !self.data[self.pos].is_ascii_digit() {
                return Err(BencodeError::InvalidKey);
            }
            let key = self.byte_string()?;

            if let Some(prev) = &last_key {
                if key == *prev {
                    return Err(BencodeError::DuplicateKey);
                }
                if key < *prev {
                    return Err(BencodeError::UnsortedKey);
                }
            }

            let value = self.value(depth + 1)?;
            last_key = Some(key.clone());
            map.insert(key, value);
        }

        self.pos += 1;
        Ok(Value::Dict(map))
    }
}
