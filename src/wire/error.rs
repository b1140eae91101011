use thiserror::Error;

/// Errors from a metadata fetch session.
#[derive(Debug, Error)]
pub enum WireError {
    /// Network I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stage or the whole session ran past its deadline.
    #[error("timeout")]
    Timeout,

    /// The peer closed the connection mid-session.
    #[error("connection closed")]
    ConnectionClosed,

    /// The handshake was not a BitTorrent handshake.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The peer answered for a different torrent.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// The peer does not speak the extension protocol or ut_metadata.
    #[error("peer lacks required extensions")]
    ExtensionsUnsupported,

    /// Malformed extension payload.
    #[error("extension error: {0}")]
    Extension(String),

    /// Bencode error inside an extension payload.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// `metadata_size` was zero or above the sanity cap.
    #[error("unacceptable metadata size: {0}")]
    InvalidMetadataSize(usize),

    /// A wire message exceeded the per-connection buffer cap.
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// A data message referenced a piece outside the metadata.
    #[error("piece {0} out of range")]
    PieceOutOfRange(u32),

    /// The peer rejected a piece request.
    #[error("piece {0} rejected by peer")]
    PieceRejected(u32),

    /// The reassembled metadata does not hash to the announced info-hash.
    #[error("metadata hash mismatch")]
    HashMismatch,
}

impl WireError {
    /// Whether the failure indicts the peer (worth a short ban) rather than
    /// the network.
    pub fn is_peer_fault(&self) -> bool {
        matches!(
            self,
            WireError::InvalidHandshake
                | WireError::InfoHashMismatch
                | WireError::HashMismatch
                | WireError::PieceOutOfRange(_)
                | WireError::InvalidMetadataSize(_)
                | WireError::MessageTooLarge(_)
        )
    }
}
