//! NAT helpers: external-address discovery and port mapping.
//!
//! Everything here is best-effort and informational. The engine starts fine
//! behind an uncooperative NAT; failures are logged and ignored.
//!
//! - [`StunClient`] learns the external `(ip, port)` of the DHT's UDP port
//!   via an RFC 5389 BINDING request (XOR-MAPPED-ADDRESS).
//! - [`PortMapper`] maps the port through UPnP IGD when a gateway answers
//!   SSDP, falling back to NAT-PMP.
//! - [`NatService`] ties both together with refresh and teardown.

mod mapper;
mod stun;

pub use mapper::{PortMapper, PortMapping, Protocol};
pub use stun::StunClient;

use std::net::IpAddr;

use thiserror::Error;
use tracing::{debug, info};

use crate::constants::NAT_LEASE_SECONDS;

/// Errors from NAT helpers; callers log and move on.
#[derive(Debug, Error)]
pub enum NatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timeout")]
    Timeout,

    #[error("every stun server failed")]
    StunFailed,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no port mapping service available")]
    NoMappingAvailable,

    #[error("mapping rejected: {0}")]
    MappingRejected(String),
}

/// External-address discovery plus port-mapping lifecycle for one UDP port.
pub struct NatService {
    mapper: Option<PortMapper>,
    mapping: PortMapping,
    external: Option<(IpAddr, u16)>,
}

impl NatService {
    /// Probes STUN and the local gateway for `local_port`. Call before the
    /// DHT socket binds: STUN sends from that exact port to learn its
    /// mapping.
    pub async fn setup(local_port: u16) -> Self {
        let external = match StunClient::default().discover(local_port).await {
            Ok((ip, port)) => {
                info!(external = %format!("{ip}:{port}"), "stun discovered external address");
                Some((ip, port))
            }
            Err(e) => {
                debug!(error = %e, "stun discovery failed");
                None
            }
        };

        let mapping = PortMapping {
            internal_port: local_port,
            external_port: local_port,
            protocol: Protocol::Udp,
            lease_seconds: NAT_LEASE_SECONDS,
        };

        let mut mapper = PortMapper::new();
        let mapper = match mapper.discover().await {
            Ok(()) => {
                match mapper.add_mapping(&mapping).await {
                    Ok(port) => info!(external_port = port, "udp port mapped"),
                    Err(e) => debug!(error = %e, "port mapping failed"),
                }
                Some(mapper)
            }
            Err(e) => {
                debug!(error = %e, "no port mapping service found");
                None
            }
        };

        Self {
            mapper,
            mapping,
            external,
        }
    }

    /// The externally visible `(ip, port)`, when STUN succeeded.
    pub fn external(&self) -> Option<(IpAddr, u16)> {
        self.external
    }

    /// Reapplies the mapping to keep the lease alive.
    pub async fn refresh(&mut self) {
        if let Some(mapper) = &self.mapper {
            if let Err(e) = mapper.add_mapping(&self.mapping).await {
                debug!(error = %e, "port mapping refresh failed");
            }
        }
    }

    /// Removes the mapping (UPnP delete; NAT-PMP zero-second lease).
    pub async fn shutdown(&mut self) {
        if let Some(mapper) = self.mapper.take() {
            if let Err(e) = mapper
                .remove_mapping(self.mapping.external_port, self.mapping.protocol)
                .await
            {
                debug!(error = %e, "port mapping removal failed");
            } else {
                info!("udp port mapping removed");
            }
        }
    }
}
