//! Local address discovery
//!
//! Finds the address other machines on the LAN can reach us at, for the
//! printed URL and the `$ip` script placeholder.

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::UdpSocket;

/// Public address used only to pick a route; no packet is sent
const PROBE_ADDR: &str = "8.8.8.8:80";

/// Address of the interface carrying the default route
///
/// Falls back to `127.0.0.1` when there is no usable route.
pub async fn local_ip() -> IpAddr {
    match discover().await {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!(error = %e, "Local IP discovery failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn discover() -> std::io::Result<IpAddr> {
    // connect() on UDP only sets the default peer, which makes the kernel
    // choose a source address
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}
