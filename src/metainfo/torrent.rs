use crate::bencode::{decode, Value};

use super::error::MetainfoError;

/// A file entry inside a multi-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// Path segments relative to the torrent root.
    pub path: Vec<String>,
    /// File size in bytes.
    pub length: i64,
}

/// Torrent metadata parsed from a raw `info` dictionary.
///
/// This is the shape ut_metadata delivers: the `info` dictionary alone, not
/// a full `.torrent` file. `announce`, `comment` and `creation date` live in
/// the outer dictionary of a `.torrent` file, but some clients embed them
/// here too, so they are read when present.
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Display name. Required; metadata without a name is useless to us.
    pub name: String,
    /// Total content size across all files.
    pub total_size: i64,
    /// Files for a multi-file torrent; empty for single-file.
    pub files: Vec<TorrentFile>,
    /// Bytes per piece, when present.
    pub piece_length: Option<i64>,
    /// Primary tracker, when embedded.
    pub announce: Option<String>,
    /// Free-form comment, when embedded.
    pub comment: Option<String>,
    /// Unix timestamp of creation, when embedded.
    pub creation_date: Option<i64>,
    /// Private-torrent flag (BEP-27).
    pub private: bool,
}

impl TorrentInfo {
    /// Parses a raw `info` dictionary.
    ///
    /// # Errors
    ///
    /// Fails on invalid bencode, a non-dictionary root, or a missing or
    /// non-UTF-8 `name`.
    pub fn from_info_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        Self::from_value(&value)
    }

    /// Parses an already-decoded `info` dictionary.
    pub fn from_value(value: &Value) -> Result<Self, MetainfoError> {
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

        let name = dict
            .get(b"name".as_slice())
            .and_then(|v| v.as_str())
            .ok_or(MetainfoError::MissingField("name"))?
            .to_string();

        let piece_length = dict
            .get(b"piece length".as_slice())
            .and_then(|v| v.as_integer());

        let announce = dict
            .get(b"announce".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let comment = dict
            .get(b"comment".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let creation_date = dict
            .get(b"creation date".as_slice())
            .and_then(|v| v.as_integer());

        let private = dict
            .get(b"private".as_slice())
            .and_then(|v| v.as_integer())
            .map(|v| v == 1)
            .unwrap_or(false);

        let (files, total_size) = if let Some(length) = dict
            .get(b"length".as_slice())
            .and_then(|v| v.as_integer())
        {
            (Vec::new(), length)
        } else if let Some(list) = dict.get(b"files".as_slice()).and_then(|v| v.as_list()) {
            let mut files = Vec::with_capacity(list.len());
            let mut total = 0i64;

            for entry in list {
                let Some(file_dict) = entry.as_dict() else {
                    continue;
                };

                let length = file_dict
                    .get(b"length".as_slice())
                    .and_then(|v| v.as_integer())
                    .unwrap_or(0);

                let path = file_dict
                    .get(b"path".as_slice())
                    .and_then(|v| v.as_list())
                    .map(|segments| {
                        segments
                            .iter()
                            .filter_map(|s| s.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();

                total = total.saturating_add(length);
                files.push(TorrentFile { path, length });
            }

            (files, total)
        } else {
            (Vec::new(), 0)
        };

        Ok(Self {
            name,
            total_size,
            files,
            piece_length,
            announce,
            comment,
            creation_date,
            private,
        })
    }

    /// Number of files, counting a single-file torrent as one.
    pub fn file_count(&self) -> usize {
        if self.files.is_empty() {
            1
        } else {
            self.files.len()
        }
    }
}
