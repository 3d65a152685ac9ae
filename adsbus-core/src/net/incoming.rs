//! Incoming listener: resolve(passive) -> bind -> listen -> accept,
//! spawning one task per accepted connection. Mirrors
//! `original_source/adsbus/incoming.c`'s `incoming_resolve` /
//! `incoming_listen` / `incoming_handler` chain; socket options applied
//! before `bind()`/`listen()` are inherited by every accepted
//! connection, same as the original's comment notes.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::TcpListener;

use crate::backoff;
use crate::endpoint;
use crate::net::socket;
use crate::resolver;
use crate::runtime::Runtime;

/// Runs one configured listener for the remainder of the process's
/// life. Acquires its `FlowGuard` once for the listener's lifetime --
/// the listener counts as one live endpoint regardless of how many
/// connections it has accepted, matching the original's `ref_count`
/// being touched only in `incoming_new`/`incoming_del`.
pub async fn run(runtime: Runtime, host: Option<String>, service: String, format: String, label: String) {
    let direction = match endpoint::classify(&format) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(category = "I", "{label}: {e}");
            runtime.shutdown.cancel();
            return;
        }
    };
    let _guard = runtime.counts.acquire(direction);

    let mut attempt: u32 = 0;
    loop {
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            outcome = bind_and_serve(&runtime, host.as_deref(), &service, &format, &label) => {
                if let Err(e) = outcome {
                    tracing::warn!(category = "I", "{label}: {e}");
                }
            }
        }

        let delay = backoff::retry_delay(attempt);
        attempt += 1;
        tracing::info!(category = "I", "{label}: will retry in {}s", delay.as_secs());
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn bind_and_serve(
    runtime: &Runtime,
    host: Option<&str>,
    service: &str,
    format: &str,
    label: &str,
) -> io::Result<()> {
    let host_display = host.unwrap_or("*");
    tracing::info!(category = "I", "{label}: resolving {host_display}/{service}...");
    let addrs = resolver::resolve_passive(host, service).await?;

    let mut bound = None;
    for addr in &addrs {
        match bind_one(*addr) {
            Ok(listener) => {
                tracing::info!(category = "I", "{label}: listening on {addr}...");
                bound = Some(listener);
                break;
            }
            Err(e) => tracing::warn!(category = "I", "{label}: failed to bind to {addr}: {e}"),
        }
    }
    let listener = bound.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("failed to bind any address for {host_display}/{service}"),
        )
    })?;

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        tracing::info!(category = "I", "{label}: new incoming connection from {peer_addr}");
        let runtime = runtime.clone();
        let format = format.to_string();
        let label = label.to_string();
        tokio::task::spawn_local(async move {
            if let Err(e) = endpoint::serve_duplex(&runtime, stream, &format, &label, false).await {
                tracing::warn!(category = "I", "{label}: {peer_addr}: {e}");
            }
        });
    }
}

fn bind_one(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let raw = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    let _ = socket::pre_bind(std::os::unix::io::AsRawFd::as_raw_fd(&raw));
    raw.bind(&SockAddr::from(addr))?;
    let _ = socket::pre_listen(std::os::unix::io::AsRawFd::as_raw_fd(&raw));
    raw.listen(255)?;
    raw.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = raw.into();
    TcpListener::from_std(std_listener)
}
