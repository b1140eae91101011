use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rand::Rng as _;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use super::NatError;
use crate::constants::STUN_TIMEOUT;

const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;

/// Public STUN servers tried in order.
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun.l.google.com:19302",
    "stun1.l.google.com:19302",
    "stun.cloudflare.com:3478",
    "stun.ekiga.net:3478",
    "stun.freeswitch.org:3478",
    "stunserver.org:3478",
];

/// Minimal RFC 5389 client: one BINDING request, read the
/// XOR-MAPPED-ADDRESS out of the answer.
pub struct StunClient {
    servers: Vec<String>,
}

impl Default for StunClient {
    fn default() -> Self {
        Self {
            servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StunClient {
    pub fn with_servers(servers: Vec<String>) -> Self {
        Self { servers }
    }

    /// Learns the external address of `local_port`, walking the server list
    /// until one answers. Binds `local_port` itself, so run it before the
    /// port's real owner does.
    pub async fn discover(&self, local_port: u16) -> Result<(IpAddr, u16), NatError> {
        let mut last = NatError::StunFailed;

        for server in &self.servers {
            match self.query(server, local_port).await {
                Ok(mapped) => return Ok(mapped),
                Err(e) => {
                    debug!(server = %server, error = %e, "stun server failed");
                    last = e;
                }
            }
        }

        Err(last)
    }

    async fn query(&self, server: &str, local_port: u16) -> Result<(IpAddr, u16), NatError> {
        let socket = UdpSocket::bind(("0.0.0.0", local_port)).await?;

        let server_addr = lookup_host(server)
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| NatError::InvalidResponse("server did not resolve".into()))?;

        let mut request = [0u8; 20];
        request[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
        // length 0: no attributes
        request[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        let mut tx_id = [0u8; 12];
        rand::rng().fill(&mut tx_id);
        request[8..20].copy_from_slice(&tx_id);

        socket.send_to(&request, server_addr).await?;

        let mut buf = [0u8; 1024];
        let (n, _) = timeout(STUN_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .map_err(|_| NatError::Timeout)??;

        parse_binding_response(&buf[..n], &tx_id)
    }
}

fn parse_binding_response(data: &[u8], tx_id: &[u8; 12]) -> Result<(IpAddr, u16), NatError> {
    if data.len() < 20 {
        return Err(NatError::InvalidResponse("short header".into()));
    }

    let msg_type = u16::from_be_bytes([data[0], data[1]]);
    let msg_len = u16::from_be_bytes([data[2], data[3]]) as usize;
    let cookie = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    if msg_type != BINDING_SUCCESS || cookie != MAGIC_COOKIE || &data[8..20] != tx_id {
        return Err(NatError::InvalidResponse("not our binding response".into()));
    }

    let mut attrs = &data[20..(20 + msg_len).min(data.len())];
    let mut plain: Option<(IpAddr, u16)> = None;

    while attrs.len() >= 4 {
        let attr_type = u16::from_be_bytes([attrs[0], attrs[1]]);
        let attr_len = u16::from_be_bytes([attrs[2], attrs[3]]) as usize;
        let padded = attr_len.div_ceil(4) * 4;

        if attrs.len() < 4 + attr_len {
            break;
        }
        let value = &attrs[4..4 + attr_len];

        match attr_type {
            ATTR_XOR_MAPPED_ADDRESS if attr_len >= 8 && value[1] == 0x01 => {
                let port = u16::from_be_bytes([value[2], value[3]]) ^ (MAGIC_COOKIE >> 16) as u16;
                let raw = u32::from_be_bytes([value[4], value[5], value[6], value[7]])
                    ^ MAGIC_COOKIE;
                return Ok((IpAddr::V4(Ipv4Addr::from(raw)), port));
            }
            ATTR_MAPPED_ADDRESS if attr_len >= 8 && value[1] == 0x01 => {
                let port = u16::from_be_bytes([value[2], value[3]]);
                let ip = Ipv4Addr::new(value[4], value[5], value[6], value[7]);
                plain = Some((IpAddr::V4(ip), port));
            }
            _ => {}
        }

        attrs = &attrs[(4 + padded).min(attrs.len())..];
    }

    plain.ok_or_else(|| NatError::InvalidResponse("no mapped address attribute".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xor_mapped_address() {
        let tx_id = [7u8; 12];
        let ip = Ipv4Addr::new(203, 0, 113, 7);
        let port: u16 = 51413;

        let xport = port ^ (MAGIC_COOKIE >> 16) as u16;
        let xaddr = u32::from(ip) ^ MAGIC_COOKIE;

        let mut resp = Vec::new();
        resp.extend_from_slice(&BINDING_SUCCESS.to_be_bytes());
        resp.extend_from_slice(&12u16.to_be_bytes()); // one attribute
        resp.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        resp.extend_from_slice(&tx_id);
        resp.extend_from_slice(&ATTR_XOR_MAPPED_ADDRESS.to_be_bytes());
        resp.extend_from_slice(&8u16.to_be_bytes());
        resp.extend_from_slice(&[0x00, 0x01]); // family: IPv4
        resp.extend_from_slice(&xport.to_be_bytes());
        resp.extend_from_slice(&xaddr.to_be_bytes());

        let (parsed_ip, parsed_port) = parse_binding_response(&resp, &tx_id).unwrap();
        assert_eq!(parsed_ip, IpAddr::V4(ip));
        assert_eq!(parsed_port, port);
    }

    #[test]
    fn rejects_wrong_transaction() {
        let mut resp = vec![0u8; 20];
        resp[0..2].copy_from_slice(&BINDING_SUCCESS.to_be_bytes());
        resp[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        // tx id stays zeroed

        assert!(parse_binding_response(&resp, &[1u8; 12]).is_err());
    }
}
