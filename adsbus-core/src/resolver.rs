//! Async name/address resolution for outgoing connectors and incoming
//! listeners.
//!
//! The original walks a `getaddrinfo` result list by hand and re-enters
//! its own peer-wakeup loop while resolution runs in a helper thread
//! (`outgoing_resolve`/`incoming_resolve`). `tokio::net::lookup_host`
//! already does its resolution off the event loop and returns a
//! ready-to-iterate list, so no wakeup indirection is needed here — see
//! `DESIGN.md`.

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use tokio::net::lookup_host;

/// Resolves `node:service` into every candidate address, in the order
/// the resolver returned them (the connector tries them in this order,
/// spec §4.3).
pub async fn resolve(node: &str, service: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs = lookup_host((node, service_port(node, service)?)).await?;
    Ok(addrs.collect())
}

/// Resolves a listen address. `host` of `None` (or empty) binds the
/// unspecified address (`::`, dual-stack where the platform allows it),
/// matching the original's default of binding all interfaces when no
/// host is given.
pub async fn resolve_passive(host: Option<&str>, service: &str) -> io::Result<Vec<SocketAddr>> {
    let port = service_port(host.unwrap_or(""), service)?;
    match host.filter(|h| !h.is_empty()) {
        Some(node) => {
            let addrs = lookup_host((node, port)).await?;
            Ok(addrs.collect())
        }
        None => Ok(vec![SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)]),
    }
}

fn service_port(node: &str, service: &str) -> io::Result<u16> {
    service.parse::<u16>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid port `{service}` for host `{node}`"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_passive_defaults_to_unspecified() {
        let addrs = resolve_passive(None, "30005").await.unwrap();
        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].ip().is_unspecified());
        assert_eq!(addrs[0].port(), 30005);
    }

    #[tokio::test]
    async fn resolve_passive_rejects_bad_port() {
        assert!(resolve_passive(None, "not-a-port").await.is_err());
    }

    #[tokio::test]
    async fn resolve_loopback_by_ip_needs_no_dns() {
        let addrs = resolve("127.0.0.1", "30005").await.unwrap();
        assert_eq!(addrs, vec![SocketAddr::from(([127, 0, 0, 1], 30005))]);
    }
}
