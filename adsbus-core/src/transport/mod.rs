//! Non-socket transports (spec §4.9): a subprocess's pipes, a plain
//! file, and the process's own standard streams. None of these need
//! the socket hygiene in `net::socket` -- `AsRawFd::as_raw_fd` on a
//! pipe or regular file simply isn't a socket, which is exactly the
//! case `net::socket`'s helpers already tolerate, so these transports
//! only reuse `endpoint::receive_only`/`send_only` directly instead of
//! `serve_duplex`.

pub mod exec;
pub mod file;
pub mod stdio;

/// Reserved `--file` path selecting the process's own stdio, since
/// spec §6.1 names no separate CLI flag for the `stdinout` module.
pub const STDIO_PATH: &str = "-";
