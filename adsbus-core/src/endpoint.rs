//! Binds a transport endpoint (TCP connection, file, pipe, stdio) to a
//! flow direction and wire format, and drives that flow until the peer
//! closes or a protocol error ends it.
//!
//! `serve_duplex` is the one entry point every socket-backed transport
//! goes through: it classifies the requested format, applies socket
//! hygiene via `AsRawFd` (tolerating `ENOTSOCK` for non-socket
//! streams), and dispatches to receive-only, send-only, or both
//! concurrently for a bidirectional format.

use std::os::unix::io::AsRawFd;

use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::buffer::{Buffer, BUF_LEN_MAX};
use crate::codec::{self, autodetect::Detector, DecodeResult, Decoder};
use crate::error::{Error, Result};
use crate::flow::Direction;
use crate::net::socket;
use crate::runtime::Runtime;

/// Determines which direction(s) `format` can serve. A format
/// recognised on both the receive and send side (raw, beast, json,
/// proto) is legal as a bidirectional endpoint; `auto` is receive-only
/// since it has no matching serializer name. This implementation's
/// resolution of the CLI surface not distinguishing "receive format"
/// from "send format" at the endpoint-spec level -- see DESIGN.md.
pub fn classify(format: &str) -> Result<Direction> {
    let can_receive = codec::is_known_receive_format(format);
    let can_send = codec::is_known_send_format(format);
    match (can_receive, can_send) {
        (true, true) => Ok(Direction::Bidirectional),
        (true, false) => Ok(Direction::Receive),
        (false, true) => Ok(Direction::Send),
        (false, false) => Err(Error::config(format!("unknown format `{format}`"))),
    }
}

/// Serves one connected duplex stream as `format` until it closes.
///
/// `hello_already_sent` is set by `net::outgoing` when the send
/// direction's greeting already rode out as TCP Fast Open SYN data;
/// every other caller passes `false` and lets the send loop write it
/// as the first ordinary write.
pub async fn serve_duplex<S>(
    runtime: &Runtime,
    stream: S,
    format: &str,
    label: &str,
    hello_already_sent: bool,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + AsRawFd + Unpin,
{
    let direction = classify(format)?;
    let fd = stream.as_raw_fd();
    let _ = socket::apply_keepalive(fd);
    match direction {
        Direction::Send => {
            let _ = socket::apply_send_side(fd);
            let _ = socket::shutdown_send_side(fd);
        }
        Direction::Receive => {
            let _ = socket::shutdown_receive_side(fd);
        }
        Direction::Bidirectional => {}
    }

    let (mut reader, mut writer) = split(stream);
    match direction {
        Direction::Receive => receive_loop(runtime, &mut reader, format, label).await,
        Direction::Send => send_loop(runtime, &mut writer, format, hello_already_sent).await,
        Direction::Bidirectional => {
            let recv = receive_loop(runtime, &mut reader, format, label);
            let send = send_loop(runtime, &mut writer, format, hello_already_sent);
            let (r, s) = tokio::join!(recv, send);
            r.and(s)
        }
    }
}

/// Runs only the receive half, for transports that are inherently
/// one-directional (an `exec` child's stdout, a receive-only `file`).
pub async fn receive_only<R: AsyncRead + Unpin>(
    runtime: &Runtime,
    reader: &mut R,
    format: &str,
    label: &str,
) -> Result<()> {
    receive_loop(runtime, reader, format, label).await
}

/// Runs only the send half.
pub async fn send_only<W: AsyncWrite + Unpin>(runtime: &Runtime, writer: &mut W, format: &str) -> Result<()> {
    send_loop(runtime, writer, format, false).await
}

async fn receive_loop<R: AsyncRead + Unpin>(
    runtime: &Runtime,
    reader: &mut R,
    format: &str,
    label: &str,
) -> Result<()> {
    let mut decoder: Box<dyn Decoder> = if format == "auto" {
        Box::new(Detector::new())
    } else {
        codec::make_decoder(format, runtime.ctx)?
    };
    let handle = runtime.receive.register(label.to_string());
    let mut buffer = Buffer::new();

    loop {
        let n = buffer
            .fill_from(reader)
            .await
            .map_err(|e| Error::protocol(format!("{label}: read error: {e}")))?;
        if n == 0 {
            drop(handle);
            return Ok(());
        }

        loop {
            match decoder.decode(buffer.as_slice())? {
                DecodeResult::Decoded { packet, consumed } => {
                    // A `PacketType::None` record is a JSON/proto
                    // header -- rescale parameters for this stream, not
                    // a packet -- and must not reach subscribers or
                    // count toward `stats`'s per-1000 threshold.
                    if packet.kind != crate::packet::PacketType::None {
                        runtime.send.broadcast(&packet);
                    }
                    buffer.consume(consumed);
                }
                DecodeResult::Incomplete => {
                    if buffer.is_full() {
                        return Err(Error::protocol(format!(
                            "{label}: no complete message fit in {BUF_LEN_MAX} bytes"
                        )));
                    }
                    break;
                }
                DecodeResult::NoMatch => {
                    return Err(Error::protocol(format!(
                        "{label}: input does not match format `{format}`"
                    )));
                }
            }
        }
    }
}

async fn send_loop<W: AsyncWrite + Unpin>(
    runtime: &Runtime,
    writer: &mut W,
    format: &str,
    hello_already_sent: bool,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_subscriber, hello) = runtime.send.subscribe(format, runtime.ctx, tx)?;

    if !hello_already_sent {
        if let Some(bytes) = hello {
            if writer.write_all(&bytes).await.is_err() {
                return Ok(());
            }
        }
    }

    while let Some(bytes) = rx.recv().await {
        if writer.write_all(&bytes).await.is_err() {
            // Peer closed its read side; end this flow, not the process.
            return Ok(());
        }
    }
    Ok(())
}
