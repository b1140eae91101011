use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;

use super::error::DhtError;
use super::node::{pack_nodes, unpack_nodes, Node, NodeId};
use crate::bencode::{decode, encode, Value};
use crate::constants::COMPACT_PEER_LEN;

/// Krpc error code for a protocol violation (bad token, malformed args).
pub const ERR_PROTOCOL: i64 = 203;

/// One of the four mainline queries.
#[derive(Debug, Clone)]
pub enum KrpcQuery {
    Ping,
    FindNode {
        target: NodeId,
    },
    GetPeers {
        info_hash: [u8; 20],
    },
    AnnouncePeer {
        info_hash: [u8; 20],
        port: u16,
        token: Bytes,
        implied_port: bool,
    },
}

impl KrpcQuery {
    pub fn name(&self) -> &'static str {
        match self {
            KrpcQuery::Ping => "ping",
            KrpcQuery::FindNode { .. } => "find_node",
            KrpcQuery::GetPeers { .. } => "get_peers",
            KrpcQuery::AnnouncePeer { .. } => "announce_peer",
        }
    }

    /// The key this query is about, used for crawl-mode ID impersonation.
    pub fn target_id(&self) -> Option<NodeId> {
        match self {
            KrpcQuery::Ping => None,
            KrpcQuery::FindNode { target } => Some(*target),
            KrpcQuery::GetPeers { info_hash } | KrpcQuery::AnnouncePeer { info_hash, .. } => {
                Some(NodeId(*info_hash))
            }
        }
    }
}

/// Fields of an `r` response. Which fields are meaningful depends on the
/// query the response answers; the transaction manager knows the query, so
/// no guessing from field shapes is needed.
#[derive(Debug, Clone, Default)]
pub struct KrpcResponseBody {
    pub id: Option<NodeId>,
    pub nodes: Vec<Node>,
    pub peers: Vec<SocketAddr>,
    pub token: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub enum KrpcBody {
    Query { sender: NodeId, query: KrpcQuery },
    Response(KrpcResponseBody),
    Error { code: i64, message: String },
}

/// A parsed or to-be-sent Krpc message.
#[derive(Debug, Clone)]
pub struct KrpcMessage {
    pub transaction_id: Bytes,
    pub body: KrpcBody,
}

impl KrpcMessage {
    pub fn query(transaction_id: Bytes, sender: NodeId, query: KrpcQuery) -> Self {
        Self {
            transaction_id,
            body: KrpcBody::Query { sender, query },
        }
    }

    pub fn response(transaction_id: Bytes, body: KrpcResponseBody) -> Self {
        Self {
            transaction_id,
            body: KrpcBody::Response(body),
        }
    }

    pub fn error(transaction_id: Bytes, code: i64, message: impl Into<String>) -> Self {
        Self {
            transaction_id,
            body: KrpcBody::Error {
                code,
                message: message.into(),
            },
        }
    }

    /// Parses a UDP datagram.
    pub fn parse(data: &[u8]) -> Result<Self, DhtError> {
        let value = decode(data)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| DhtError::Protocol("root is not a dict".into()))?;

        let transaction_id = dict
            .get(b"t".as_slice())
            .and_then(|v| v.as_bytes())
            .cloned()
            .ok_or_else(|| DhtError::Protocol("missing transaction id".into()))?;

        let body = match dict.get(b"y".as_slice()).and_then(|v| v.as_str()) {
            Some("q") => parse_query(dict)?,
            Some("r") => parse_response(dict)?,
            Some("e") => parse_error(dict)?,
            Some(other) => {
                return Err(DhtError::Protocol(format!("unknown message type {other:?}")))
            }
            None => return Err(DhtError::Protocol("missing message type".into())),
        };

        Ok(Self {
            transaction_id,
            body,
        })
    }

    /// Encodes for the wire.
    pub fn encode(&self) -> Vec<u8> {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"t"),
            Value::Bytes(self.transaction_id.clone()),
        );

        match &self.body {
            KrpcBody::Query { sender, query } => {
                dict.insert(Bytes::from_static(b"y"), Value::string("q"));
                dict.insert(Bytes::from_static(b"q"), Value::string(query.name()));
                dict.insert(Bytes::from_static(b"a"), encode_args(sender, query));
            }
            KrpcBody::Response(body) => {
                dict.insert(Bytes::from_static(b"y"), Value::string("r"));
                dict.insert(Bytes::from_static(b"r"), encode_response(body));
            }
            KrpcBody::Error { code, message } => {
                dict.insert(Bytes::from_static(b"y"), Value::string("e"));
                dict.insert(
                    Bytes::from_static(b"e"),
                    Value::List(vec![Value::Integer(*code), Value::string(message)]),
                );
            }
        }

        encode(&Value::Dict(dict))
    }
}

fn encode_args(sender: &NodeId, query: &KrpcQuery) -> Value {
    let mut args = BTreeMap::new();
    args.insert(
        Bytes::from_static(b"id"),
        Value::Bytes(Bytes::copy_from_slice(sender.as_bytes())),
    );

    match query {
        KrpcQuery::Ping => {}
        KrpcQuery::FindNode { target } => {
            args.insert(
                Bytes::from_static(b"target"),
                Value::Bytes(Bytes::copy_from_slice(target.as_bytes())),
            );
        }
        KrpcQuery::GetPeers { info_hash } => {
            args.insert(
                Bytes::from_static(b"info_hash"),
                Value::Bytes(Bytes::copy_from_slice(info_hash)),
            );
        }
        KrpcQuery::AnnouncePeer {
            info_hash,
            port,
            token,
            implied_port,
        } => {
            args.insert(
                Bytes::from_static(b"info_hash"),
                Value::Bytes(Bytes::copy_from_slice(info_hash)),
            );
            args.insert(Bytes::from_static(b"port"), Value::Integer(*port as i64));
            args.insert(Bytes::from_static(b"token"), Value::Bytes(token.clone()));
            if *implied_port {
                args.insert(Bytes::from_static(b"implied_port"), Value::Integer(1));
            }
        }
    }

    Value::Dict(args)
}

fn encode_response(body: &KrpcResponseBody) -> Value {
    let mut resp = BTreeMap::new();

    if let Some(id) = &body.id {
        resp.insert(
            Bytes::from_static(b"id"),
            Value::Bytes(Bytes::copy_from_slice(id.as_bytes())),
        );
    }

    if !body.nodes.is_empty() {
        resp.insert(
            Bytes::from_static(b"nodes"),
            Value::Bytes(pack_nodes(&body.nodes)),
        );
    }

    if !body.peers.is_empty() {
        let values = body
            .peers
            .iter()
            .filter_map(|addr| {
                let SocketAddr::V4(v4) = addr else {
                    return None;
                };
                let mut compact = [0u8; COMPACT_PEER_LEN];
                compact[..4].copy_from_slice(&v4.ip().octets());
                compact[4..].copy_from_slice(&v4.port().to_be_bytes());
                Some(Value::Bytes(Bytes::copy_from_slice(&compact)))
            })
            .collect();
        resp.insert(Bytes::from_static(b"values"), Value::List(values));
    }

    if let Some(token) = &body.token {
        resp.insert(Bytes::from_static(b"token"), Value::Bytes(token.clone()));
    }

    Value::Dict(resp)
}

fn parse_query(dict: &BTreeMap<Bytes, Value>) -> Result<KrpcBody, DhtError> {
    let name = dict
        .get(b"q".as_slice())
        .and_then(|v| v.as_str())
        .ok_or_else(|| DhtError::Protocol("missing query name".into()))?;

    let args = dict
        .get(b"a".as_slice())
        .and_then(|v| v.as_dict())
        .ok_or_else(|| DhtError::Protocol("missing query args".into()))?;

    let sender = args
        .get(b"id".as_slice())
        .and_then(|v| v.as_bytes())
        .and_then(|b| NodeId::from_bytes(b).ok())
        .ok_or_else(|| DhtError::Protocol("missing sender id".into()))?;

    let info_hash_arg = || {
        args.get(b"info_hash".as_slice())
            .and_then(|v| v.as_bytes())
            .and_then(|b| <[u8; 20]>::try_from(b.as_ref()).ok())
            .ok_or_else(|| DhtError::Protocol("missing info_hash".into()))
    };

    let query = match name {
        "ping" => KrpcQuery::Ping,
        "find_node" => {
            let target = args
                .get(b"target".as_slice())
                .and_then(|v| v.as_bytes())
                .and_then(|b| NodeId::from_bytes(b).ok())
                .ok_or_else(|| DhtError::Protocol("missing target".into()))?;
            KrpcQuery::FindNode { target }
        }
        "get_peers" => KrpcQuery::GetPeers {
            info_hash: info_hash_arg()?,
        },
        "announce_peer" => {
            let port = args
                .get(b"port".as_slice())
                .and_then(|v| v.as_integer())
                .filter(|p| (0..=u16::MAX as i64).contains(p))
                .ok_or_else(|| DhtError::Protocol("missing port".into()))?;

            let token = args
                .get(b"token".as_slice())
                .and_then(|v| v.as_bytes())
                .cloned()
                .ok_or_else(|| DhtError::Protocol("missing token".into()))?;

            let implied_port = args
                .get(b"implied_port".as_slice())
                .and_then(|v| v.as_integer())
                .is_some_and(|v| v == 1);

            KrpcQuery::AnnouncePeer {
                info_hash: info_hash_arg()?,
                port: port as u16,
                token,
                implied_port,
            }
        }
        other => return Err(DhtError::Protocol(format!("unknown query {other:?}"))),
    };

    Ok(KrpcBody::Query { sender, query })
}

fn parse_response(dict: &BTreeMap<Bytes, Value>) -> Result<KrpcBody, DhtError> {
    let resp = dict
        .get(b"r".as_slice())
        .and_then(|v| v.as_dict())
        .ok_or_else(|| DhtError::Protocol("missing response dict".into()))?;

    let id = resp
        .get(b"id".as_slice())
        .and_then(|v| v.as_bytes())
        .and_then(|b| NodeId::from_bytes(b).ok());

    let nodes = resp
        .get(b"nodes".as_slice())
        .and_then(|v| v.as_bytes())
        .map(|data| unpack_nodes(data))
        .unwrap_or_default();

    let peers = resp
        .get(b"values".as_slice())
        .and_then(|v| v.as_list())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_bytes())
                .filter(|b| b.len() == COMPACT_PEER_LEN)
                .map(|b| {
                    let ip = Ipv4Addr::new(b[0], b[1], b[2], b[3]);
                    let port = u16::from_be_bytes([b[4], b[5]]);
                    SocketAddr::new(IpAddr::V4(ip), port)
                })
                .filter(|addr| addr.port() != 0)
                .collect()
        })
        .unwrap_or_default();

    let token = resp
        .get(b"token".as_slice())
        .and_then(|v| v.as_bytes())
        .cloned();

    Ok(KrpcBody::Response(KrpcResponseBody {
        id,
        nodes,
        peers,
        token,
    }))
}

fn parse_error(dict: &BTreeMap<Bytes, Value>) -> Result<KrpcBody, DhtError> {
    let list = dict
        .get(b"e".as_slice())
        .and_then(|v| v.as_list())
        .ok_or_else(|| DhtError::Protocol("missing error list".into()))?;

    let code = list.first().and_then(|v| v.as_integer()).unwrap_or(0);
    let message = list
        .get(1)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();

    Ok(KrpcBody::Error { code, message })
}
