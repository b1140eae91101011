use thiserror::Error;

/// Errors raised by the DHT engine.
#[derive(Debug, Error)]
pub enum DhtError {
    /// Socket error; fatal at bind time, logged and ignored elsewhere.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Packet was not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// Packet decoded but was not a well-formed Krpc message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A node ID or info-hash was not 20 bytes.
    #[error("invalid node id length")]
    InvalidNodeId,

    /// A listen address could not be interpreted.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The engine was asked to do something its configuration cannot support.
    #[error("config error: {0}")]
    Config(&'static str),

    /// Operation attempted before `run()` brought the engine up.
    #[error("dht is not ready")]
    NotReady,
}
