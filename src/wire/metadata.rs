use std::collections::BTreeMap;

use bytes::Bytes;
use sha1::{Digest, Sha1};

use super::error::WireError;
use crate::bencode::{decode, encode, Value};
use crate::constants::{MAX_METADATA_SIZE, METADATA_PIECE_SIZE};

/// ut_metadata message kinds (BEP-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

/// A ut_metadata message: a bencoded header, with the raw piece bytes
/// appended after the header for data messages.
#[derive(Debug, Clone)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    pub total_size: Option<i64>,
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    /// A request for one metadata piece.
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"msg_type"),
            Value::Integer(self.msg_type as i64),
        );
        dict.insert(
            Bytes::from_static(b"piece"),
            Value::Integer(self.piece as i64),
        );
        if let Some(total_size) = self.total_size {
            dict.insert(
                Bytes::from_static(b"total_size"),
                Value::Integer(total_size),
            );
        }

        let mut out = encode(&Value::Dict(dict));
        if let Some(ref data) = self.data {
            out.extend_from_slice(data);
        }
        Bytes::from(out)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let header_end = bencoded_dict_end(payload)?;

        let value = decode(&payload[..header_end])?;
        let dict = value
            .as_dict()
            .ok_or_else(|| WireError::Extension("metadata header is not a dict".into()))?;

        let msg_type = dict
            .get(b"msg_type".as_slice())
            .and_then(|v| v.as_integer())
            .and_then(MetadataMessageType::from_i64)
            .ok_or_else(|| WireError::Extension("bad msg_type".into()))?;

        let piece = dict
            .get(b"piece".as_slice())
            .and_then(|v| v.as_integer())
            .filter(|p| (0..=u32::MAX as i64).contains(p))
            .ok_or_else(|| WireError::Extension("bad piece".into()))? as u32;

        let total_size = dict
            .get(b"total_size".as_slice())
            .and_then(|v| v.as_integer());

        let data = (msg_type == MetadataMessageType::Data && header_end < payload.len())
            .then(|| Bytes::copy_from_slice(&payload[header_end..]));

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

/// Scans past the bencoded header of a ut_metadata message, returning the
/// offset where the appended piece bytes begin.
fn bencoded_dict_end(payload: &[u8]) -> Result<usize, WireError> {
    if payload.first() != Some(&b'd') {
        return Err(WireError::Extension("payload must start with a dict".into()));
    }

    let mut depth = 0usize;
    let mut i = 0;

    while i < payload.len() {
        match payload[i] {
            b'd' | b'l' => {
                depth += 1;
                i += 1;
            }
            b'e' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| WireError::Extension("unbalanced bencode".into()))?;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            b'i' => {
                i += 1;
                while i < payload.len() && payload[i] != b'e' {
                    i += 1;
                }
                i += 1;
            }
            b'0'..=b'9' => {
                let len_start = i;
                while i < payload.len() && payload[i] != b':' {
                    i += 1;
                }
                let len: usize = std::str::from_utf8(&payload[len_start..i])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| WireError::Extension("bad string length".into()))?;
                i += 1 + len;
            }
            _ => return Err(WireError::Extension("invalid bencode in header".into())),
        }
    }

    Err(WireError::Extension("unterminated header dict".into()))
}

/// Reassembles metadata pieces, in any order, into the full `info`
/// dictionary and verifies it against the announced info-hash.
///
/// Pieces are 16 KiB except the last, which carries the remainder.
pub struct MetadataAssembler {
    total: usize,
    buf: Vec<u8>,
    have: Vec<bool>,
    received: usize,
}

impl MetadataAssembler {
    /// Starts an assembly for a `metadata_size` announced by the peer.
    ///
    /// # Errors
    ///
    /// `InvalidMetadataSize` when the size is zero or above the sanity cap.
    pub fn new(total: usize) -> Result<Self, WireError> {
        if total == 0 || total > MAX_METADATA_SIZE {
            return Err(WireError::InvalidMetadataSize(total));
        }

        let num_pieces = total.div_ceil(METADATA_PIECE_SIZE);
        Ok(Self {
            total,
            buf: vec![0u8; total],
            have: vec![false; num_pieces],
            received: 0,
        })
    }

    pub fn num_pieces(&self) -> usize {
        self.have.len()
    }

    /// Expected byte length of piece `i`.
    pub fn piece_len(&self, piece: u32) -> usize {
        let offset = piece as usize * METADATA_PIECE_SIZE;
        if offset >= self.total {
            0
        } else {
            (self.total - offset).min(METADATA_PIECE_SIZE)
        }
    }

    /// Stores a piece at its offset. Duplicate pieces are ignored; a piece
    /// outside the metadata or with the wrong length fails the session.
    pub fn insert(&mut self, piece: u32, data: &[u8]) -> Result<(), WireError> {
        let idx = piece as usize;
        if idx >= self.have.len() {
            return Err(WireError::PieceOutOfRange(piece));
        }
        if data.len() != self.piece_len(piece) {
            return Err(WireError::PieceOutOfRange(piece));
        }
        if self.have[idx] {
            return Ok(());
        }

        let offset = idx * METADATA_PIECE_SIZE;
        self.buf[offset..offset + data.len()].copy_from_slice(data);
        self.have[idx] = true;
        self.received += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.have.len()
    }

    /// Checks `SHA-1(buffer)` against the announced info-hash and hands the
    /// buffer over.
    pub fn verify(self, info_hash: &[u8; 20]) -> Result<Bytes, WireError> {
        let mut hasher = Sha1::new();
        hasher.update(&self.buf);
        let digest: [u8; 20] = hasher.finalize().into();

        if &digest != info_hash {
            return Err(WireError::HashMismatch);
        }

        Ok(Bytes::from(self.buf))
    }
}
