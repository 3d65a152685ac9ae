//! Multi-format encode/decode layer: the six wire formats named in
//! `SPEC_FULL.md` §4.5 (raw, beast, airspy_adsb, JSON, proto, stats)
//! plus the autodetecting dispatcher used on ingest when a flow's
//! format is `auto`.

pub mod airspy;
pub mod autodetect;
pub mod beast;
pub mod json;
pub mod proto;
pub mod raw;
pub mod stats;

use crate::error::{Error, Result};
use crate::identity::ServerId;
use crate::packet::Packet;

/// Outcome of attempting to decode one message from the front of a
/// byte slice.
#[derive(Debug)]
pub enum DecodeResult {
    /// A full message was decoded; `consumed` bytes should be removed
    /// from the front of the buffer.
    Decoded { packet: Packet, consumed: usize },
    /// The buffer doesn't yet contain a full message of this format,
    /// but might once more data arrives. Must not be returned if the
    /// decoder is certain the bytes are not this format.
    Incomplete,
    /// The bytes at the front of the buffer are not (the start of) a
    /// message in this format.
    NoMatch,
}

/// Per-connection decoder. Stateful: JSON/proto decoders track header
/// rescale parameters and loop detection, and decoders with an MLAT
/// stream track rescaler state, across calls.
pub trait Decoder {
    fn name(&self) -> &'static str;
    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult>;
}

/// Per-connection serializer. Stateful: JSON/proto serializers emit a
/// hello header once; the stats serializer accumulates counters.
pub trait Serializer {
    fn name(&self) -> &'static str;

    /// Greeting to write before any other bytes, if this format defines
    /// one (JSON, proto). Called at most once per connection.
    fn hello(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Serializes a packet. May legally return an empty `Vec` (e.g. the
    /// stats serializer only emits below its 1000-packet threshold).
    fn serialize(&mut self, packet: &Packet) -> Vec<u8>;
}

/// Context shared by every decoder/serializer constructor: local server
/// identity (for hello headers and loop detection) and the canonical
/// rescale parameters advertised to peers.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext {
    pub server_id: ServerId,
    pub server_version: &'static str,
}

/// Construct the decoder for an explicitly named receive format.
/// Returns `Err(Error::Config)` for `auto` (use `autodetect::Detector`
/// instead) or an unknown name.
pub fn make_decoder(name: &str, ctx: CodecContext) -> Result<Box<dyn Decoder>> {
    match name {
        "raw" => Ok(Box::new(raw::RawCodec::new())),
        "beast" => Ok(Box::new(beast::BeastCodec::new())),
        "airspy_adsb" => Ok(Box::new(airspy::AirspyCodec::new())),
        "json" => Ok(Box::new(json::JsonCodec::new(ctx))),
        "proto" => Ok(Box::new(proto::ProtoCodec::new(ctx))),
        other => Err(Error::config(format!("unknown receive format `{other}`"))),
    }
}

/// Construct the serializer for a named send format.
pub fn make_serializer(name: &str, ctx: CodecContext) -> Result<Box<dyn Serializer>> {
    match name {
        "raw" => Ok(Box::new(raw::RawCodec::new())),
        "beast" => Ok(Box::new(beast::BeastCodec::new())),
        "json" => Ok(Box::new(json::JsonCodec::new(ctx))),
        "proto" => Ok(Box::new(proto::ProtoCodec::new(ctx))),
        "stats" => Ok(Box::new(stats::StatsCodec::new())),
        other => Err(Error::config(format!("unknown send format `{other}`"))),
    }
}

/// Formats that can be the target of a receive flow, including the
/// pseudo-format `auto`.
pub fn is_known_receive_format(name: &str) -> bool {
    matches!(name, "auto" | "raw" | "beast" | "airspy_adsb" | "json" | "proto")
}

pub fn is_known_send_format(name: &str) -> bool {
    matches!(name, "raw" | "beast" | "json" | "proto" | "stats")
}
