use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket as StdUdpSocket};

use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::NatError;
use crate::constants::{
    NATPMP_PORT, NATPMP_READ_TIMEOUT, SSDP_MULTICAST, SSDP_PORT, UPNP_DISCOVERY_TIMEOUT,
    UPNP_REQUEST_TIMEOUT,
};

const WANIP_SERVICE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

/// A port mapping request.
#[derive(Debug, Clone, Copy)]
pub struct PortMapping {
    pub internal_port: u16,
    pub external_port: u16,
    pub protocol: Protocol,
    pub lease_seconds: u32,
}

/// Mapping protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }

    fn natpmp_opcode(&self) -> u8 {
        match self {
            Protocol::Udp => 1,
            Protocol::Tcp => 2,
        }
    }
}

/// Port mapper: UPnP IGD preferred, NAT-PMP fallback.
pub struct PortMapper {
    control_url: Option<String>,
    natpmp_gateway: Option<Ipv4Addr>,
}

impl Default for PortMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PortMapper {
    pub fn new() -> Self {
        Self {
            control_url: None,
            natpmp_gateway: None,
        }
    }

    /// Finds a mapping service: SSDP for a UPnP gateway first, then a
    /// NAT-PMP probe against common gateway addresses.
    pub async fn discover(&mut self) -> Result<(), NatError> {
        if let Ok(control_url) = self.discover_upnp().await {
            self.control_url = Some(control_url);
            return Ok(());
        }

        if let Ok(gateway) = self.discover_natpmp().await {
            self.natpmp_gateway = Some(gateway);
            return Ok(());
        }

        Err(NatError::NoMappingAvailable)
    }

    /// Applies a mapping; returns the external port granted.
    pub async fn add_mapping(&self, mapping: &PortMapping) -> Result<u16, NatError> {
        if let Some(control_url) = &self.control_url {
            return self.add_upnp_mapping(control_url, mapping).await;
        }
        if let Some(gateway) = self.natpmp_gateway {
            return self.add_natpmp_mapping(gateway, mapping).await;
        }
        Err(NatError::NoMappingAvailable)
    }

    /// Deletes a mapping: explicit delete on UPnP, zero-second lease on
    /// NAT-PMP.
    pub async fn remove_mapping(&self, external_port: u16, protocol: Protocol) -> Result<(), NatError> {
        if let Some(control_url) = &self.control_url {
            return self.remove_upnp_mapping(control_url, external_port, protocol).await;
        }
        if let Some(gateway) = self.natpmp_gateway {
            return self.remove_natpmp_mapping(gateway, external_port, protocol).await;
        }
        Err(NatError::NoMappingAvailable)
    }

    async fn discover_upnp(&self) -> Result<String, NatError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;

        let search = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST}:{SSDP_PORT}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 3\r\n\
             ST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
             \r\n"
        );

        let multicast: Ipv4Addr = SSDP_MULTICAST
            .parse()
            .map_err(|_| NatError::InvalidResponse("bad multicast literal".into()))?;
        socket
            .send_to(search.as_bytes(), SocketAddrV4::new(multicast, SSDP_PORT))
            .await?;

        let mut buf = vec![0u8; 2048];
        let (n, _) = timeout(UPNP_DISCOVERY_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .map_err(|_| NatError::Timeout)??;

        let response = std::str::from_utf8(&buf[..n])
            .map_err(|_| NatError::InvalidResponse("non-utf8 ssdp response".into()))?;

        let location = response
            .lines()
            .find(|l| l.to_lowercase().starts_with("location:"))
            .and_then(|l| l.splitn(2, ':').nth(1).map(|v| v.trim().to_string()))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| NatError::InvalidResponse("no location header".into()))?;

        self.fetch_control_url(&location).await
    }

    async fn fetch_control_url(&self, location: &str) -> Result<String, NatError> {
        let client = reqwest::Client::new();
        let response = timeout(UPNP_REQUEST_TIMEOUT, client.get(location).send())
            .await
            .map_err(|_| NatError::Timeout)??;
        let body = response.text().await?;

        let service_pos = body
            .find(WANIP_SERVICE)
            .ok_or_else(|| NatError::InvalidResponse("no WANIPConnection service".into()))?;
        let rest = &body[service_pos..];

        let control = rest
            .find("<controlURL>")
            .map(|s| s + "<controlURL>".len())
            .and_then(|s| rest[s..].find("</controlURL>").map(|e| &rest[s..s + e]))
            .ok_or_else(|| NatError::InvalidResponse("control URL not found".into()))?;

        if control.starts_with("http") {
            Ok(control.to_string())
        } else {
            // Relative control path: resolve against the device base URL.
            let base = location
                .find("://")
                .and_then(|scheme| {
                    location[scheme + 3..]
                        .find('/')
                        .map(|slash| &location[..scheme + 3 + slash])
                })
                .unwrap_or(location);
            Ok(format!("{base}{control}"))
        }
    }

    async fn discover_natpmp(&self) -> Result<Ipv4Addr, NatError> {
        let candidates = [
            default_gateway_guess(),
            Some(Ipv4Addr::new(192, 168, 1, 1)),
            Some(Ipv4Addr::new(192, 168, 0, 1)),
            Some(Ipv4Addr::new(10, 0, 0, 1)),
        ];

        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        for gateway in candidates.into_iter().flatten() {
            // Version 0, opcode 0: external address request.
            let probe = [0u8, 0];
            if socket
                .send_to(&probe, SocketAddrV4::new(gateway, NATPMP_PORT))
                .await
                .is_err()
            {
                continue;
            }

            let mut buf = [0u8; 16];
            if let Ok(Ok((n, _))) = timeout(NATPMP_READ_TIMEOUT, socket.recv_from(&mut buf)).await
            {
                if n >= 12 && buf[0] == 0 && buf[1] == 128 && buf[3] == 0 {
                    return Ok(gateway);
                }
            }
        }

        Err(NatError::NoMappingAvailable)
    }

    async fn add_upnp_mapping(
        &self,
        control_url: &str,
        mapping: &PortMapping,
    ) -> Result<u16, NatError> {
        let local_ip = local_ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED);

        let body = format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body>
<u:AddPortMapping xmlns:u="{WANIP_SERVICE}">
<NewRemoteHost></NewRemoteHost>
<NewExternalPort>{}</NewExternalPort>
<NewProtocol>{}</NewProtocol>
<NewInternalPort>{}</NewInternalPort>
<NewInternalClient>{}</NewInternalClient>
<NewEnabled>1</NewEnabled>
<NewPortMappingDescription>btspider</NewPortMappingDescription>
<NewLeaseDuration>{}</NewLeaseDuration>
</u:AddPortMapping>
</s:Body>
</s:Envelope>"#,
            mapping.external_port,
            mapping.protocol.as_str(),
            mapping.internal_port,
            local_ip,
            mapping.lease_seconds
        );

        let response = self
            .soap(control_url, "AddPortMapping", body)
            .await?;

        if response.status().is_success() {
            Ok(mapping.external_port)
        } else {
            Err(NatError::MappingRejected(response.status().to_string()))
        }
    }

    async fn remove_upnp_mapping(
        &self,
        control_url: &str,
        external_port: u16,
        protocol: Protocol,
    ) -> Result<(), NatError> {
        let body = format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body>
<u:DeletePortMapping xmlns:u="{WANIP_SERVICE}">
<NewRemoteHost></NewRemoteHost>
<NewExternalPort>{external_port}</NewExternalPort>
<NewProtocol>{}</NewProtocol>
</u:DeletePortMapping>
</s:Body>
</s:Envelope>"#,
            protocol.as_str()
        );

        let _ = self.soap(control_url, "DeletePortMapping", body).await;
        Ok(())
    }

    async fn soap(
        &self,
        control_url: &str,
        action: &str,
        body: String,
    ) -> Result<reqwest::Response, NatError> {
        let client = reqwest::Client::new();
        timeout(
            UPNP_REQUEST_TIMEOUT,
            client
                .post(control_url)
                .header("Content-Type", "text/xml")
                .header("SOAPAction", format!("\"{WANIP_SERVICE}#{action}\""))
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| NatError::Timeout)?
        .map_err(NatError::from)
    }

    async fn add_natpmp_mapping(
        &self,
        gateway: Ipv4Addr,
        mapping: &PortMapping,
    ) -> Result<u16, NatError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let mut request = Vec::with_capacity(12);
        request.push(0);
        request.push(mapping.protocol.natpmp_opcode());
        request.extend_from_slice(&[0, 0]);
        request.extend_from_slice(&mapping.internal_port.to_be_bytes());
        request.extend_from_slice(&mapping.external_port.to_be_bytes());
        request.extend_from_slice(&mapping.lease_seconds.to_be_bytes());

        socket
            .send_to(&request, SocketAddrV4::new(gateway, NATPMP_PORT))
            .await?;

        let mut buf = [0u8; 16];
        let (n, _) = timeout(UPNP_REQUEST_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .map_err(|_| NatError::Timeout)??;

        if n >= 16 && buf[3] == 0 {
            Ok(u16::from_be_bytes([buf[10], buf[11]]))
        } else {
            Err(NatError::MappingRejected(format!(
                "nat-pmp result code {}",
                buf.get(3).copied().unwrap_or(0xFF)
            )))
        }
    }

    async fn remove_natpmp_mapping(
        &self,
        gateway: Ipv4Addr,
        external_port: u16,
        protocol: Protocol,
    ) -> Result<(), NatError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        // Zero external port and zero lease request deletion.
        let mut request = Vec::with_capacity(12);
        request.push(0);
        request.push(protocol.natpmp_opcode());
        request.extend_from_slice(&[0, 0]);
        request.extend_from_slice(&external_port.to_be_bytes());
        request.extend_from_slice(&[0, 0]);
        request.extend_from_slice(&0u32.to_be_bytes());

        socket
            .send_to(&request, SocketAddrV4::new(gateway, NATPMP_PORT))
            .await?;
        Ok(())
    }
}

/// The IPv4 address the OS would route external traffic from.
fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = StdUdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(v4) => Some(*v4.ip()),
        _ => None,
    }
}

/// Crude default-gateway guess: x.y.z.1 on the local /24.
fn default_gateway_guess() -> Option<Ipv4Addr> {
    let local = local_ipv4()?;
    let octets = local.octets();
    Some(Ipv4Addr::new(octets[0], octets[1], octets[2], 1))
}
