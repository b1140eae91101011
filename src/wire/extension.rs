use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::WireError;
use crate::bencode::{decode, encode, Value};

/// Peer-wire message id carrying extension protocol traffic (BEP-10).
pub const EXTENSION_MSG_ID: u8 = 20;

/// Extension message id of the extension handshake itself.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// Name of the metadata exchange extension (BEP-9).
pub const UT_METADATA: &str = "ut_metadata";

/// The extension message id we assign to ut_metadata in our handshake.
pub const LOCAL_UT_METADATA_ID: u8 = 1;

/// The BEP-10 extension handshake payload.
#[derive(Debug, Clone, Default)]
pub struct ExtensionHandshake {
    /// Extension name → message id the sender assigned it (`m` dict).
    pub extensions: BTreeMap<String, u8>,
    /// Client name/version (`v`).
    pub client: Option<String>,
    /// Size of the `info` dictionary, when the sender has it.
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    /// The handshake the crawler sends: ut_metadata at our local id, no
    /// metadata to offer.
    pub fn local() -> Self {
        let mut hs = Self::default();
        hs.extensions
            .insert(UT_METADATA.to_string(), LOCAL_UT_METADATA_ID);
        hs.metadata_size = Some(0);
        hs
    }

    /// The message id the peer assigned to ut_metadata, if any.
    pub fn ut_metadata_id(&self) -> Option<u8> {
        self.extensions.get(UT_METADATA).copied()
    }

    pub fn encode(&self) -> Bytes {
        let mut dict = BTreeMap::new();

        let mut m = BTreeMap::new();
        for (name, id) in &self.extensions {
            m.insert(
                Bytes::copy_from_slice(name.as_bytes()),
                Value::Integer(*id as i64),
            );
        }
        dict.insert(Bytes::from_static(b"m"), Value::Dict(m));

        if let Some(ref client) = self.client {
            dict.insert(Bytes::from_static(b"v"), Value::string(client));
        }

        if let Some(size) = self.metadata_size {
            dict.insert(Bytes::from_static(b"metadata_size"), Value::Integer(size));
        }

        Bytes::from(encode(&Value::Dict(dict)))
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let value = decode(data)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| WireError::Extension("handshake is not a dict".into()))?;

        let mut hs = Self::default();

        if let Some(m) = dict.get(b"m".as_slice()).and_then(|v| v.as_dict()) {
            for (key, val) in m {
                let (Ok(name), Some(id)) = (std::str::from_utf8(key), val.as_integer()) else {
                    continue;
                };
                // id 0 means the peer disabled the extension
                if (1..=u8::MAX as i64).contains(&id) {
                    hs.extensions.insert(name.to_string(), id as u8);
                }
            }
        }

        hs.client = dict
            .get(b"v".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        hs.metadata_size = dict
            .get(b"metadata_size".as_slice())
            .and_then(|v| v.as_integer());

        Ok(hs)
    }
}
