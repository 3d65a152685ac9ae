//! `raw` (line) format: ASCII `@<hex>;` for Mode-AC, `*<hex>;` for
//! Mode-S short (7 bytes) and long (14 bytes) -- disambiguated by hex
//! length since both share the `*` sentinel.

use crate::codec::{DecodeResult, Decoder, Serializer};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketType};

pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        RawCodec
    }
}

impl Default for RawCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        let Some(&lead) = data.first() else {
            return Ok(DecodeResult::Incomplete);
        };
        if lead != b'@' && lead != b'*' {
            return Ok(DecodeResult::NoMatch);
        }

        let Some(rel_semi) = data[1..].iter().position(|&b| b == b';') else {
            return Ok(DecodeResult::Incomplete);
        };
        let hex_bytes = &data[1..1 + rel_semi];

        let kind = match (lead, hex_bytes.len()) {
            (b'@', 4) => PacketType::ModeAc,
            (b'*', 14) => PacketType::ModeSShort,
            (b'*', 28) => PacketType::ModeSLong,
            _ => {
                return Err(Error::protocol(format!(
                    "raw: unexpected hex length {} for leading byte {}",
                    hex_bytes.len(),
                    lead as char
                )))
            }
        };

        let payload = hex::decode(hex_bytes)
            .map_err(|e| Error::protocol(format!("raw: invalid hex payload: {e}")))?;

        let packet = Packet::new(kind, &payload, [0u8; crate::packet::ID_LEN]);
        let consumed = 1 + hex_bytes.len() + 1;
        Ok(DecodeResult::Decoded { packet, consumed })
    }
}

impl Serializer for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn serialize(&mut self, packet: &Packet) -> Vec<u8> {
        let lead = match packet.kind {
            PacketType::None => return Vec::new(),
            PacketType::ModeAc => b'@',
            PacketType::ModeSShort | PacketType::ModeSLong => b'*',
        };
        let mut out = Vec::with_capacity(1 + packet.payload().len() * 2 + 2);
        out.push(lead);
        out.extend(hex::encode_upper(packet.payload()).into_bytes());
        out.push(b';');
        out.push(b'\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ID_LEN;

    #[test]
    fn decodes_mode_s_long() {
        let mut codec = RawCodec::new();
        let line = b"*8D4840D6202CC371C32CE0576098;trailing";
        match codec.decode(line).unwrap() {
            DecodeResult::Decoded { packet, consumed } => {
                assert_eq!(packet.kind, PacketType::ModeSLong);
                assert_eq!(consumed, 1 + 28 + 1);
                assert_eq!(hex::encode_upper(packet.payload()), "8D4840D6202CC371C32CE0576098");
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn non_sentinel_leader_is_no_match() {
        let mut codec = RawCodec::new();
        assert!(matches!(codec.decode(b"garbage").unwrap(), DecodeResult::NoMatch));
    }

    #[test]
    fn missing_terminator_is_incomplete() {
        let mut codec = RawCodec::new();
        assert!(matches!(codec.decode(b"*8D4840").unwrap(), DecodeResult::Incomplete));
    }

    #[test]
    fn round_trips_mode_s_short() {
        let mut codec = RawCodec::new();
        let payload = [0xAAu8; 7];
        let packet = Packet::new(PacketType::ModeSShort, &payload, [b'x'; ID_LEN]);
        let bytes = codec.serialize(&packet);
        match codec.decode(&bytes).unwrap() {
            DecodeResult::Decoded { packet: decoded, .. } => {
                assert_eq!(decoded.payload(), payload);
                assert_eq!(decoded.kind, PacketType::ModeSShort);
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }
}
