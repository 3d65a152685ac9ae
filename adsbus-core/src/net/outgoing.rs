//! Outgoing connector: resolve -> connect (TCP Fast Open where the
//! kernel supports it) -> serve -> retry with backoff, for as long as
//! the process runs. Mirrors `original_source/adsbus/outgoing.c`'s
//! state machine (`outgoing_resolve` / `outgoing_connect_next` /
//! `outgoing_connect_result` / `outgoing_retry`); the address-list walk
//! is an explicit loop here rather than the original's self-described
//! "tail recursion" (DESIGN.md).

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::TcpStream;

use crate::backoff;
use crate::codec;
use crate::endpoint;
use crate::net::socket;
use crate::resolver;
use crate::runtime::Runtime;

/// Runs one configured outgoing connector for the remainder of the
/// process's life. Acquires its `FlowGuard` once, for the connector's
/// entire lifetime including every reconnect -- not per connection --
/// matching the original's `ref_count` being touched only in
/// `outgoing_new`/`outgoing_del`, never per attempt.
pub async fn run(runtime: Runtime, node: String, service: String, format: String, label: String) {
    let direction = match endpoint::classify(&format) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(category = "O", "{label}: {e}");
            runtime.shutdown.cancel();
            return;
        }
    };
    let _guard = runtime.counts.acquire(direction);

    let mut attempt: u32 = 0;
    loop {
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            outcome = connect_and_serve(&runtime, &node, &service, &format, &label) => {
                match outcome {
                    Ok(()) => {
                        tracing::info!(category = "O", "{label}: peer disconnected; reconnecting...");
                        attempt = 0;
                    }
                    Err(e) => tracing::warn!(category = "O", "{label}: {e}"),
                }
            }
        }

        let delay = backoff::retry_delay(attempt);
        attempt += 1;
        tracing::info!(category = "O", "{label}: will retry in {}s", delay.as_secs());
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn connect_and_serve(
    runtime: &Runtime,
    node: &str,
    service: &str,
    format: &str,
    label: &str,
) -> io::Result<()> {
    tracing::info!(category = "O", "{label}: resolving {node}/{service}...");
    let addrs = resolver::resolve(node, service).await?;
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {node}/{service}"),
        ));
    }

    let hello = hello_for(runtime, format);

    let mut last_err = None;
    for addr in &addrs {
        tracing::info!(category = "O", "{label}: connecting to {addr}...");
        match connect_one(*addr, &hello).await {
            Ok((stream, hello_sent)) => {
                tracing::info!(category = "O", "{label}: connected to {addr}");
                return endpoint::serve_duplex(runtime, stream, format, label, hello_sent)
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
            }
            Err(e) => {
                tracing::warn!(category = "O", "{label}: can't connect to {addr}: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no addresses to try")))
}

/// The greeting to carry as TCP Fast Open SYN data, if this flow sends
/// in a format that defines one. Built from a throwaway serializer
/// instance purely to call `hello()` once.
fn hello_for(runtime: &Runtime, format: &str) -> Vec<u8> {
    codec::make_serializer(format, runtime.ctx)
        .ok()
        .and_then(|mut s| s.hello())
        .unwrap_or_default()
}

/// Connects to `addr`, attempting TCP Fast Open with `hello` as the SYN
/// payload first. Falls back to a plain non-blocking `connect()` when
/// the kernel rejects `MSG_FASTOPEN` outright (`ENOPROTOOPT`/
/// `EOPNOTSUPP`) -- the original asserts fast-open support
/// unconditionally, which makes it unusable on hosts without it
/// (DESIGN.md Open Question 3). Returns whether `hello` was actually
/// carried by the SYN, so the caller can skip writing it again.
async fn connect_one(addr: SocketAddr, hello: &[u8]) -> io::Result<(TcpStream, bool)> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let raw = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    raw.set_nonblocking(true)?;
    let _ = socket::pre_bind(std::os::unix::io::AsRawFd::as_raw_fd(&raw));
    let sockaddr = SockAddr::from(addr);

    let mut hello_sent = false;
    let sent = unsafe {
        libc::sendto(
            std::os::unix::io::AsRawFd::as_raw_fd(&raw),
            hello.as_ptr() as *const libc::c_void,
            hello.len(),
            libc::MSG_FASTOPEN,
            sockaddr.as_ptr(),
            sockaddr.len(),
        )
    };
    if sent < 0 {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ENOPROTOOPT) | Some(libc::EOPNOTSUPP) => {
                if let Err(e) = raw.connect(&sockaddr) {
                    if !is_in_progress(&e) {
                        return Err(e);
                    }
                }
            }
            Some(libc::EINPROGRESS) | Some(libc::EAGAIN) => {
                hello_sent = !hello.is_empty();
            }
            _ => return Err(err),
        }
    } else {
        hello_sent = !hello.is_empty();
    }

    let std_stream: std::net::TcpStream = raw.into();
    let stream = TcpStream::from_std(std_stream)?;
    stream.writable().await?;
    if let Some(e) = stream.take_error()? {
        return Err(e);
    }
    Ok((stream, hello_sent))
}

fn is_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EINPROGRESS)
}
