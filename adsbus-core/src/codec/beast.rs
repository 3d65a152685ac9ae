//! `beast` (binary) format: 0x1A framing with 0x1A bytes escaped by
//! doubling, a type byte in {'1','2','3'} selecting Mode-AC /
//! Mode-S-short / Mode-S-long, a 6-byte MLAT counter, a 1-byte signal
//! level, and the payload.
//!
//! Beast's native clock ticks at exactly the canonical MLAT rate
//! (`CANONICAL_MLAT_MHZ`) with a 48-bit counter, so rescaling between
//! beast's wire representation and the canonical `u64` space is a
//! simple bit shift rather than a full MHz-ratio computation.

use crate::codec::{DecodeResult, Decoder, Serializer};
use crate::error::{Error, Result};
use crate::packet::{MlatState, Packet, PacketType};

const SYNC: u8 = 0x1A;
const BEAST_MHZ: u16 = 12;
const BEAST_COUNTER_MAX: u64 = (1u64 << 48) - 1;

pub struct BeastCodec {
    mlat: MlatState,
}

impl BeastCodec {
    pub fn new() -> Self {
        BeastCodec {
            mlat: MlatState::new(BEAST_MHZ, BEAST_COUNTER_MAX),
        }
    }
}

impl Default for BeastCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn type_payload_len(type_byte: u8) -> Option<(PacketType, usize)> {
    match type_byte {
        b'1' => Some((PacketType::ModeAc, 2)),
        b'2' => Some((PacketType::ModeSShort, 7)),
        b'3' => Some((PacketType::ModeSLong, 14)),
        _ => None,
    }
}

impl Decoder for BeastCodec {
    fn name(&self) -> &'static str {
        "beast"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        if data.first() != Some(&SYNC) {
            return Ok(DecodeResult::NoMatch);
        }

        let mut pos = 1usize;
        let mut unescaped: Vec<u8> = Vec::with_capacity(8 + 14);
        let mut need: Option<usize> = None;

        loop {
            if let Some(need) = need {
                if unescaped.len() == need {
                    break;
                }
            }
            let Some(&byte) = data.get(pos) else {
                return Ok(DecodeResult::Incomplete);
            };
            if byte == SYNC {
                match data.get(pos + 1) {
                    Some(&SYNC) => {
                        unescaped.push(SYNC);
                        pos += 2;
                    }
                    Some(_) => {
                        return Err(Error::protocol("beast: unescaped 0x1A mid-frame"));
                    }
                    None => return Ok(DecodeResult::Incomplete),
                }
            } else {
                unescaped.push(byte);
                pos += 1;
            }

            if need.is_none() && !unescaped.is_empty() {
                let Some((_, payload_len)) = type_payload_len(unescaped[0]) else {
                    return Ok(DecodeResult::NoMatch);
                };
                need = Some(1 + 6 + 1 + payload_len);
            }
        }

        let (kind, payload_len) = type_payload_len(unescaped[0]).expect("checked above");
        let mlat_raw = {
            let mut v = 0u64;
            for &b in &unescaped[1..7] {
                v = (v << 8) | b as u64;
            }
            v
        };
        let signal = unescaped[7];
        let payload = &unescaped[8..8 + payload_len];

        let mut packet = Packet::new(kind, payload, [0u8; crate::packet::ID_LEN]);
        packet.mlat_timestamp = self.mlat.scale_in(mlat_raw);
        packet.rssi = crate::packet::rssi_scale_in(signal as u32, 255);

        Ok(DecodeResult::Decoded { packet, consumed: pos })
    }
}

impl Serializer for BeastCodec {
    fn name(&self) -> &'static str {
        "beast"
    }

    fn serialize(&mut self, packet: &Packet) -> Vec<u8> {
        let type_byte = match packet.kind {
            PacketType::None => return Vec::new(),
            PacketType::ModeAc => b'1',
            PacketType::ModeSShort => b'2',
            PacketType::ModeSLong => b'3',
        };

        let mlat_raw = (packet.mlat_timestamp >> 16) & BEAST_COUNTER_MAX;
        let signal = ((packet.rssi as u64) * 255 / u32::MAX as u64) as u8;

        let mut body = Vec::with_capacity(8 + packet.payload().len());
        body.push(type_byte);
        for shift in (0..6).rev() {
            body.push(((mlat_raw >> (shift * 8)) & 0xFF) as u8);
        }
        body.push(signal);
        body.extend_from_slice(packet.payload());

        let mut out = Vec::with_capacity(2 + body.len() * 2);
        out.push(SYNC);
        for b in body {
            out.push(b);
            if b == SYNC {
                out.push(SYNC);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mode_s_long_example() {
        let mut codec = BeastCodec::new();
        let bytes: Vec<u8> = vec![
            0x1A, b'3', 0, 0, 0, 0, 0, 0, 0, 0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71, 0xC3,
            0x2C, 0xE0, 0x57, 0x60, 0x98,
        ];
        match codec.decode(&bytes).unwrap() {
            DecodeResult::Decoded { packet, consumed } => {
                assert_eq!(packet.kind, PacketType::ModeSLong);
                assert_eq!(consumed, bytes.len());
                assert_eq!(hex::encode_upper(packet.payload()), "8D4840D6202CC371C32CE0576098");
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_escaped_sync_byte_in_payload() {
        let mut codec = BeastCodec::new();
        let mut payload = [0u8; 7];
        payload[3] = SYNC;
        let mut packet = Packet::new(PacketType::ModeSShort, &payload, [0u8; crate::packet::ID_LEN]);
        packet.rssi = 0x8000_0000;
        let bytes = codec.serialize(&packet);
        // The escaped sync byte should appear doubled in the wire bytes.
        assert!(bytes.windows(2).any(|w| w == [SYNC, SYNC]));

        let mut decoder = BeastCodec::new();
        match decoder.decode(&bytes).unwrap() {
            DecodeResult::Decoded { packet: decoded, consumed } => {
                assert_eq!(decoded.payload(), payload);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn non_sync_leader_is_no_match() {
        let mut codec = BeastCodec::new();
        assert!(matches!(codec.decode(b"hello").unwrap(), DecodeResult::NoMatch));
    }
}
