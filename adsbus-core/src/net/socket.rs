//! Raw socket hygiene, applied at the points named in `SPEC_FULL.md`
//! §6.3. Mirrors `original_source/adsbus/socket.c` function-for-function,
//! using `libc::setsockopt`/`shutdown` directly rather than `socket2`
//! since several of these options (`TCP_FASTOPEN`, `TCP_USER_TIMEOUT`,
//! `TCP_WINDOW_CLAMP`) have no cross-platform wrapper.
//!
//! Every option applied after a connection exists tolerates `ENOTSOCK`
//! (a `file`/`stdio`/`exec` endpoint reusing the same serving code as a
//! TCP one), matching the original's `errno == ENOTSOCK` early-return.

use std::io;
use std::os::unix::io::RawFd;

fn setsockopt_i32(fd: RawFd, level: libc::c_int, name: libc::c_int, value: i32) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const i32 as *const libc::c_void,
            std::mem::size_of::<i32>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn tolerate_not_a_socket(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.raw_os_error() == Some(libc::ENOTSOCK) => Ok(()),
        other => other,
    }
}

/// `SO_REUSEPORT`, applied before `bind()` to every listening and
/// connecting socket so restarts don't collide with lingering sockets
/// in `TIME_WAIT`.
pub fn pre_bind(fd: RawFd) -> io::Result<()> {
    setsockopt_i32(fd, libc::SOL_SOCKET, libc::SO_REUSEPORT, 1)
}

/// `TCP_FASTOPEN` queue length, applied before `listen()`. Unlike the
/// original's unconditional `assert`, the caller is expected to
/// tolerate `ENOPROTOOPT`/`EOPNOTSUPP` here -- not every kernel ships
/// fast-open support (DESIGN.md Open Question 3).
pub fn pre_listen(fd: RawFd) -> io::Result<()> {
    const FAST_OPEN_QUEUE_LEN: i32 = 5;
    setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_FASTOPEN, FAST_OPEN_QUEUE_LEN)
}

/// Keepalive and dead-peer detection, applied once a connection is
/// live in either direction.
pub fn apply_keepalive(fd: RawFd) -> io::Result<()> {
    tolerate_not_a_socket((|| {
        setsockopt_i32(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
        setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, 30)?;
        setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, 10)?;
        setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 3)?;
        setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_USER_TIMEOUT, 60_000)
    })())
}

/// Applied to a flow established as send-only: shrinks the receive
/// buffer and advertised window as far as the kernel allows, since this
/// direction is never read from.
pub fn apply_send_side(fd: RawFd) -> io::Result<()> {
    tolerate_not_a_socket((|| {
        setsockopt_i32(fd, libc::SOL_SOCKET, libc::SO_RCVBUF, 128)?;
        setsockopt_i32(fd, libc::IPPROTO_TCP, libc::TCP_WINDOW_CLAMP, 128)
    })())
}

/// Half-closes the read side of a send-only flow.
pub fn shutdown_send_side(fd: RawFd) -> io::Result<()> {
    tolerate_not_a_socket(shutdown_raw(fd, libc::SHUT_RD))
}

/// Half-closes the write side of a receive-only flow.
pub fn shutdown_receive_side(fd: RawFd) -> io::Result<()> {
    tolerate_not_a_socket(shutdown_raw(fd, libc::SHUT_WR))
}

fn shutdown_raw(fd: RawFd, how: libc::c_int) -> io::Result<()> {
    let ret = unsafe { libc::shutdown(fd, how) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
