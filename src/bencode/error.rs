use thiserror::Error;

/// Errors that can occur while decoding bencode.
///
/// # Examples
///
/// ```
/// use btspider::bencode::{decode, BencodeError};
///
/// assert!(matches!(decode(b"i42"), Err(BencodeError::UnexpectedEof)));
/// assert!(matches!(decode(b"i007e"), Err(BencodeError::InvalidInteger(_))));
/// assert!(matches!(decode(b"i42eextra"), Err(BencodeError::TrailingData)));
/// assert!(matches!(decode(b"d1:b0:1:a0:e"), Err(BencodeError::UnsortedKey)));
/// ```
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    /// Input ended before a complete value was parsed.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Integer is malformed: empty, `-0`, leading zeros, or out of range.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Byte-string length prefix is not a plain decimal number.
    #[error("invalid string length")]
    InvalidStringLength,

    /// Encountered a byte that no value can start with.
    #[error("unexpected byte: 0x{0:02x}")]
    UnexpectedByte(u8),

    /// Dictionary key is not a byte string.
    #[error("dictionary key is not a byte string")]
    InvalidKey,

    /// Dictionary keys are not in ascending raw-byte order.
    #[error("dictionary keys not sorted")]
    UnsortedKey,

    /// The same dictionary key appears twice.
    #[error("duplicate dictionary key")]
    DuplicateKey,

    /// Extra data exists after the value.
    #[error("trailing data after value")]
    TrailingData,

    /// Recursion limit exceeded.
    #[error("nesting too deep")]
    NestingTooDeep,
}
