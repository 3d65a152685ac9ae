//! End-to-end scenarios from `SPEC_FULL.md` §8, exercised through the
//! real `endpoint::receive_only` + `registry::SendRegistry` path rather
//! than mocked codec calls -- a `tokio::net::UnixStream` pair stands in
//! for a TCP connection's reader half, and a registry subscription
//! stands in for a connected send-side socket (skipping only the
//! `send_loop` write-out, which `registry.rs`'s own unit tests already
//! cover).

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use adsbus_core::codec::{self, Serializer};
use adsbus_core::endpoint;
use adsbus_core::error::Error;
use adsbus_core::identity::ServerId;
use adsbus_core::packet::{Packet, PacketType, ID_LEN};
use adsbus_core::runtime::Runtime;

fn local() -> tokio::task::LocalSet {
    tokio::task::LocalSet::new()
}

/// Scenario 1: "Raw -> JSON translate". A bare raw line with no
/// preceding header decodes to one packet, and the JSON subscriber
/// receives it as a single well-formed JSON line.
#[tokio::test(flavor = "current_thread")]
async fn raw_line_translates_to_one_json_object() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (_subscriber, hello) = runtime.send.subscribe("json", runtime.ctx, tx).unwrap();
            assert!(hello.is_some(), "json defines a hello greeting");

            let (mut writer, mut reader) = UnixStream::pair().unwrap();
            writer.write_all(b"*8D4840D6202CC371C32CE0576098;").await.unwrap();
            drop(writer);

            endpoint::receive_only(&runtime, &mut reader, "auto", "test").await.unwrap();

            let bytes = rx.try_recv().expect("json subscriber should have received one packet");
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["type"], "Mode-S long");
            assert_eq!(value["payload"], "8D4840D6202CC371C32CE0576098");
            assert!(rx.try_recv().is_err(), "exactly one packet, no more");
        })
        .await;
}

/// Scenario 2: "Beast -> raw". The spec's example frame uses type byte
/// `0x32` ('2'), which by §4.5 selects Mode-S *short* (7-byte payload)
/// -- a typo, since the frame carries a 14-byte payload and the spec's
/// own expected output is the Mode-S *long* raw line. Uses `0x33` ('3')
/// here so the bytes, the type byte, and the expected output agree.
#[tokio::test(flavor = "current_thread")]
async fn beast_bytes_translate_to_raw_line() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (_subscriber, hello) = runtime.send.subscribe("raw", runtime.ctx, tx).unwrap();
            assert!(hello.is_none(), "raw has no hello greeting");

            let beast_bytes: [u8; 23] = [
                0x1A, b'3', 0, 0, 0, 0, 0, 0, 0, 0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71,
                0xC3, 0x2C, 0xE0, 0x57, 0x60, 0x98,
            ];
            let (mut writer, mut reader) = UnixStream::pair().unwrap();
            writer.write_all(&beast_bytes).await.unwrap();
            drop(writer);

            endpoint::receive_only(&runtime, &mut reader, "beast", "test").await.unwrap();

            let bytes = rx.try_recv().expect("raw subscriber should have received one packet");
            assert_eq!(bytes, b"*8D4840D6202CC371C32CE0576098;\n");
        })
        .await;
}

/// Scenario 3: "JSON loop guard". A header announcing our own
/// server_id is rejected and no packet is ever broadcast.
#[tokio::test(flavor = "current_thread")]
async fn json_header_with_own_server_id_is_rejected() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (_subscriber, _hello) = runtime.send.subscribe("raw", runtime.ctx, tx).unwrap();

            let header = format!(
                "{{\"type\":\"header\",\"magic\":\"aDsB\",\"server_id\":\"{}\",\"server_version\":\"v\",\"mlat_timestamp_mhz\":12,\"mlat_timestamp_max\":281474976710655,\"rssi_max\":255}}\n",
                runtime.ctx.server_id.as_str()
            );
            let (mut writer, mut reader) = UnixStream::pair().unwrap();
            writer.write_all(header.as_bytes()).await.unwrap();
            drop(writer);

            let result = endpoint::receive_only(&runtime, &mut reader, "json", "test").await;
            assert!(matches!(result, Err(Error::Protocol(_))));
            assert!(rx.try_recv().is_err(), "loop-detected header must not reach any subscriber");
        })
        .await;
}

/// Scenario 4: "Stats emission". Exactly one stats snapshot is emitted
/// after 1,000 Mode-S-short packets, with the matching count.
#[tokio::test(flavor = "current_thread")]
async fn stats_emits_once_per_thousand_packets() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            // `SendRegistry` only holds a `Weak` to each subscriber, so the
            // `Rc` handle must stay alive for the whole broadcast loop.
            let (_subscriber, hello) = runtime.send.subscribe("stats", runtime.ctx, tx).unwrap();
            assert!(hello.is_none(), "stats has no hello greeting");

            let packet = Packet::new(PacketType::ModeSShort, &[0u8; 7], [b'x'; ID_LEN]);
            for _ in 0..1000 {
                runtime.send.broadcast(&packet);
            }

            let mut snapshots = Vec::new();
            while let Ok(bytes) = rx.try_recv() {
                snapshots.push(bytes);
            }
            assert_eq!(snapshots.len(), 1, "exactly one stats snapshot for 1000 packets");
            let value: serde_json::Value = serde_json::from_slice(&snapshots[0]).unwrap();
            assert_eq!(value["packet_counts"]["Mode-S short"], 1000);
        })
        .await;
}

/// A JSON header from a genuine peer (not a loop-detected one) carries
/// rescale parameters, not a packet: it must never reach a subscriber,
/// and must not count toward `stats`'s threshold -- regression for a
/// header being broadcast as a `PacketType::None` "packet".
#[tokio::test(flavor = "current_thread")]
async fn json_header_from_a_real_peer_is_not_broadcast() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (_subscriber, _hello) = runtime.send.subscribe("raw", runtime.ctx, tx).unwrap();

            let header = "{\"type\":\"header\",\"magic\":\"aDsB\",\"server_id\":\"someoneelse\",\"server_version\":\"v\",\"mlat_timestamp_mhz\":12,\"mlat_timestamp_max\":281474976710655,\"rssi_max\":255}\n";
            let msg = "{\"type\":\"Mode-S short\",\"source_id\":\"src1\",\"hops\":0,\"payload\":\"AABBCCDDEEFF00\"}\n";
            let (mut writer, mut reader) = UnixStream::pair().unwrap();
            writer.write_all(header.as_bytes()).await.unwrap();
            writer.write_all(msg.as_bytes()).await.unwrap();
            drop(writer);

            endpoint::receive_only(&runtime, &mut reader, "json", "test").await.unwrap();

            assert!(rx.try_recv().is_ok(), "the one real packet must be broadcast");
            assert!(rx.try_recv().is_err(), "the header itself must not be broadcast");
        })
        .await;
}

/// Scenario 6: "Idle shutdown". A receive endpoint that hits EOF
/// immediately drops its `FlowGuard`, and `Runtime::watch_idle`
/// observes the idle condition without any further input.
#[tokio::test(flavor = "current_thread")]
async fn eof_receive_endpoint_drives_runtime_idle() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let guard = runtime.counts.acquire(adsbus_core::flow::Direction::Receive);
            assert!(!runtime.counts.is_idle());

            let (writer, mut reader) = UnixStream::pair().unwrap();
            drop(writer); // immediate EOF, as a `--file raw=/nonexistent/empty` source would give

            endpoint::receive_only(&runtime, &mut reader, "auto", "test").await.unwrap();
            drop(guard);

            runtime.watch_idle().await;
            assert!(runtime.shutdown.is_cancelled());
        })
        .await;
}

/// "Serializer agreement": two different output formats observe the
/// same packet sequence (count, type, source_id) from one input stream.
#[tokio::test(flavor = "current_thread")]
async fn two_serializers_agree_on_packet_sequence() {
    local()
        .run_until(async {
            let runtime = Runtime::new().unwrap();
            let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
            let (proto_tx, mut proto_rx) = mpsc::unbounded_channel();
            let (_raw_sub, _) = runtime.send.subscribe("raw", runtime.ctx, raw_tx).unwrap();
            let (_proto_sub, _) = runtime.send.subscribe("proto", runtime.ctx, proto_tx).unwrap();

            let mut encoder = codec::make_serializer("raw", runtime.ctx).unwrap();
            let packets: Vec<Packet> = (0..5)
                .map(|i| {
                    let mut id = [b' '; ID_LEN];
                    id[0] = b'a' + i as u8;
                    Packet::new(PacketType::ModeSShort, &[i as u8; 7], id)
                })
                .collect();

            let (mut writer, mut reader) = UnixStream::pair().unwrap();
            for p in &packets {
                writer.write_all(&encoder.serialize(p)).await.unwrap();
            }
            drop(writer);

            endpoint::receive_only(&runtime, &mut reader, "raw", "test").await.unwrap();

            let mut raw_seen = Vec::new();
            while let Ok(bytes) = raw_rx.try_recv() {
                raw_seen.push(bytes);
            }
            let mut proto_seen = Vec::new();
            while let Ok(bytes) = proto_rx.try_recv() {
                proto_seen.push(bytes);
            }
            // proto's first message is its hello header, not a packet.
            assert_eq!(raw_seen.len(), packets.len());
            assert_eq!(proto_seen.len() - 1, packets.len());
        })
        .await;
}

#[allow(dead_code)]
fn test_ctx() -> adsbus_core::codec::CodecContext {
    adsbus_core::codec::CodecContext { server_id: ServerId::generate(), server_version: "test" }
}
