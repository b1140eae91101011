use std::fmt::Write as _;

use super::info_hash::InfoHash;

/// A magnet URI under construction ([BEP-9]).
///
/// The crawler only composes magnet links (for store records); it never has
/// to parse them.
///
/// # Examples
///
/// ```
/// use btspider::metainfo::{InfoHash, MagnetLink};
///
/// let hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a").unwrap();
/// let magnet = MagnetLink::new(hash).with_display_name("Example File");
///
/// assert_eq!(
///     magnet.to_uri(),
///     "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a&dn=Example%20File",
/// );
/// ```
///
/// [BEP-9]: http://bittorrent.org/beps/bep_0009.html
#[derive(Debug, Clone)]
pub struct MagnetLink {
    /// The torrent's info-hash.
    pub info_hash: InfoHash,
    /// Suggested display name (`dn`).
    pub display_name: Option<String>,
    /// Tracker URLs (`tr`).
    pub trackers: Vec<String>,
}

impl MagnetLink {
    /// Creates a magnet link for an info-hash.
    pub fn new(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            display_name: None,
            trackers: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Appends a tracker URL.
    pub fn with_tracker(mut self, tracker: impl Into<String>) -> Self {
        self.trackers.push(tracker.into());
        self
    }

    /// Renders the URI: `magnet:?xt=urn:btih:<hex>[&tr=…][&dn=…]`.
    ///
    /// The hash is lowercase hex; name and tracker values are
    /// percent-escaped.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("magnet:?xt=urn:btih:{}", self.info_hash.to_hex());

        for tracker in &self.trackers {
            let _ = write!(uri, "&tr={}", url_encode(tracker));
        }

        if let Some(ref name) = self.display_name {
            let _ = write!(uri, "&dn={}", url_encode(name));
        }

        uri
    }
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());

    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }

    out
}
