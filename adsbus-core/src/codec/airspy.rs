//! `airspy_adsb` format: decode-only text frames carrying a hex payload
//! followed by `;`-separated `key=value` annotations, terminated by a
//! newline, e.g. `8D4840D6202CC371C32CE0576098;mlat=123456;rssi=42\n`.
//!
//! The upstream `airspy_adsb` tool is a source-only producer (the spec
//! lists it among the four decoders but not the six encoders), so there
//! is no corresponding `Serializer` impl.

use crate::codec::{DecodeResult, Decoder};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketType};

pub struct AirspyCodec;

impl AirspyCodec {
    pub fn new() -> Self {
        AirspyCodec
    }
}

impl Default for AirspyCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn packet_type_for_hex_len(len: usize) -> Option<PacketType> {
    match len {
        4 => Some(PacketType::ModeAc),
        14 => Some(PacketType::ModeSShort),
        28 => Some(PacketType::ModeSLong),
        _ => None,
    }
}

fn parse_annotations(field: &str) -> (Option<u64>, Option<u32>) {
    let mut mlat = None;
    let mut rssi = None;
    for kv in field.split(';') {
        if let Some((key, value)) = kv.split_once('=') {
            match key {
                "mlat" => mlat = value.parse().ok(),
                "rssi" => rssi = value.parse().ok(),
                _ => {}
            }
        }
    }
    (mlat, rssi)
}

impl Decoder for AirspyCodec {
    fn name(&self) -> &'static str {
        "airspy_adsb"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        if !data.first().is_some_and(u8::is_ascii_hexdigit) {
            return Ok(DecodeResult::NoMatch);
        }

        let Some(newline) = data.iter().position(|&b| b == b'\n') else {
            return Ok(DecodeResult::Incomplete);
        };
        let line = &data[..newline];
        let consumed = newline + 1;

        let mut fields = line.splitn(2, |&b| b == b';');
        let hex_field = fields.next().unwrap_or(b"");
        let rest = fields.next().unwrap_or(b"");

        if !hex_field.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::protocol("airspy_adsb: non-hex payload field"));
        }
        let Some(kind) = packet_type_for_hex_len(hex_field.len()) else {
            return Err(Error::protocol(format!(
                "airspy_adsb: unexpected hex length {}",
                hex_field.len()
            )));
        };

        let payload = hex::decode(hex_field)
            .map_err(|e| Error::protocol(format!("airspy_adsb: invalid hex payload: {e}")))?;

        let (mlat, rssi) = parse_annotations(std::str::from_utf8(rest).unwrap_or(""));

        let mut packet = Packet::new(kind, &payload, [0u8; crate::packet::ID_LEN]);
        if let Some(mlat) = mlat {
            packet.mlat_timestamp = mlat;
        }
        if let Some(rssi) = rssi {
            packet.rssi = rssi;
        }

        Ok(DecodeResult::Decoded { packet, consumed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mode_s_long_with_annotations() {
        let mut codec = AirspyCodec::new();
        let line = b"8D4840D6202CC371C32CE0576098;mlat=123456;rssi=42\nnext";
        match codec.decode(line).unwrap() {
            DecodeResult::Decoded { packet, consumed } => {
                assert_eq!(packet.kind, PacketType::ModeSLong);
                assert_eq!(packet.mlat_timestamp, 123456);
                assert_eq!(packet.rssi, 42);
                assert_eq!(consumed, line.len() - b"next".len());
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn decodes_without_annotations() {
        let mut codec = AirspyCodec::new();
        let line = b"8D4840D6202CC371C32CE0576098\n";
        match codec.decode(line).unwrap() {
            DecodeResult::Decoded { packet, .. } => {
                assert_eq!(packet.mlat_timestamp, 0);
                assert_eq!(packet.rssi, 0);
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn non_hex_leader_is_no_match() {
        let mut codec = AirspyCodec::new();
        assert!(matches!(codec.decode(b"*not hex").unwrap(), DecodeResult::NoMatch));
    }

    #[test]
    fn missing_newline_is_incomplete() {
        let mut codec = AirspyCodec::new();
        assert!(matches!(codec.decode(b"8D4840").unwrap(), DecodeResult::Incomplete));
    }
}
