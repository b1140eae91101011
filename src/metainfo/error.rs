use thiserror::Error;

/// Errors raised while interpreting torrent metadata.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// Info dictionary is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// An info-hash was not 20 bytes / 40 hex characters.
    #[error("invalid info hash length")]
    InvalidInfoHashLength,

    /// A required field is missing from the info dictionary.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}
