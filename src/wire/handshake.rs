use bytes::{BufMut, Bytes, BytesMut};

use super::error::WireError;

/// The BitTorrent protocol identifier.
pub const PROTOCOL: &[u8] = b"BitTorrent protocol";

/// Length of the handshake message in bytes.
pub const HANDSHAKE_LEN: usize = 68;

/// Reserved byte 5, bit 0x10: extension protocol support (BEP-10).
const EXTENSION_BIT: u8 = 0x10;

/// The fixed BEP-3 handshake:
/// `19 "BitTorrent protocol" reserved[8] info_hash[20] peer_id[20]`.
///
/// The crawler only ever negotiates the extension protocol, so the one
/// reserved bit it sets — and the one it requires of peers — is BEP-10.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
    pub reserved: [u8; 8],
}

impl Handshake {
    /// Creates a handshake advertising extension protocol support.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        let mut reserved = [0u8; 8];
        reserved[5] |= EXTENSION_BIT;
        Self {
            info_hash,
            peer_id,
            reserved,
        }
    }

    /// Whether the remote set the BEP-10 extension bit.
    pub fn supports_extension_protocol(&self) -> bool {
        self.reserved[5] & EXTENSION_BIT != 0
    }

    /// Encodes the 68-byte handshake.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    /// Decodes a 68-byte handshake.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HANDSHAKE_LEN || data[0] as usize != PROTOCOL.len() {
            return Err(WireError::InvalidHandshake);
        }
        if &data[1..20] != PROTOCOL {
            return Err(WireError::InvalidHandshake);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash,
            peer_id,
            reserved,
        })
    }
}
