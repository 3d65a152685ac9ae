//! `json` format: newline-delimited JSON objects. The first object on
//! a stream must be a `header` carrying the peer's server id and
//! canonical rescale parameters; later objects carry packets in the
//! source's own MLAT/RSSI scale, rescaled into the canonical space as
//! they're parsed.

use serde_json::{json, Value};

use crate::codec::{CodecContext, DecodeResult, Decoder, Serializer};
use crate::error::{Error, Result};
use crate::identity::ServerId;
use crate::packet::{MlatState, Packet, PacketType, ID_LEN};

const JSON_MAGIC: &str = "aDsB";

struct HeaderState {
    mlat: MlatState,
    rssi_max: u32,
}

pub struct JsonCodec {
    ctx: CodecContext,
    header: Option<HeaderState>,
    hello_sent: bool,
}

impl JsonCodec {
    pub fn new(ctx: CodecContext) -> Self {
        JsonCodec { ctx, header: None, hello_sent: false }
    }
}

fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn u64_field(obj: &Value, key: &str) -> Option<u64> {
    obj.get(key).and_then(Value::as_u64)
}

fn source_id_from_str(s: &str) -> Result<[u8; ID_LEN]> {
    if s.len() > ID_LEN || !s.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(Error::protocol("json: invalid source_id"));
    }
    let mut buf = [0u8; ID_LEN];
    buf[..s.len()].copy_from_slice(s.as_bytes());
    Ok(buf)
}

impl JsonCodec {
    fn parse_header(&mut self, obj: &Value) -> Result<()> {
        let magic = str_field(obj, "magic").ok_or_else(|| Error::protocol("json: missing magic"))?;
        if magic != JSON_MAGIC {
            return Err(Error::protocol("json: bad magic"));
        }
        let server_id = str_field(obj, "server_id")
            .ok_or_else(|| Error::protocol("json: missing server_id"))?;
        let mhz = u64_field(obj, "mlat_timestamp_mhz")
            .ok_or_else(|| Error::protocol("json: missing mlat_timestamp_mhz"))?;
        let max_counter = u64_field(obj, "mlat_timestamp_max")
            .ok_or_else(|| Error::protocol("json: missing mlat_timestamp_max"))?;
        let rssi_max = u64_field(obj, "rssi_max")
            .ok_or_else(|| Error::protocol("json: missing rssi_max"))?;

        if mhz == 0 || mhz > u16::MAX as u64 || max_counter == 0 || rssi_max == 0 || rssi_max > u32::MAX as u64 {
            return Err(Error::protocol("json: rescale parameters out of range"));
        }

        if server_id == self.ctx.server_id.as_str() {
            return Err(Error::protocol(format!(
                "json: peer server_id {server_id} matches ours; loop detected"
            )));
        }

        self.header = Some(HeaderState {
            mlat: MlatState::new(mhz as u16, max_counter),
            rssi_max: rssi_max as u32,
        });
        Ok(())
    }

    fn parse_common(&mut self, obj: &Value, kind: PacketType) -> Result<Packet> {
        let state = self
            .header
            .as_mut()
            .ok_or_else(|| Error::protocol("json: packet received before header"))?;

        let source_id = str_field(obj, "source_id")
            .ok_or_else(|| Error::protocol("json: missing source_id"))?;
        let source_id = source_id_from_str(source_id)?;
        let hops = u64_field(obj, "hops").unwrap_or(0);
        if hops > u16::MAX as u64 {
            return Err(Error::protocol("json: hops out of range"));
        }

        let payload_hex = obj
            .get("payload")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("json: missing payload"))?;
        if payload_hex.len() != kind.payload_len() * 2 {
            return Err(Error::protocol("json: payload length mismatch"));
        }
        let payload = hex::decode(payload_hex)
            .map_err(|e| Error::protocol(format!("json: invalid hex payload: {e}")))?;

        let mut packet = Packet::new(kind, &payload, source_id);
        packet.hops = hops as u16;

        if let Some(raw) = u64_field(obj, "mlat_timestamp") {
            packet.mlat_timestamp = state.mlat.scale_in(raw);
        }
        if let Some(raw) = u64_field(obj, "rssi") {
            if raw > state.rssi_max as u64 {
                return Err(Error::protocol("json: rssi exceeds declared rssi_max"));
            }
            packet.rssi = crate::packet::rssi_scale_in(raw as u32, state.rssi_max);
        }

        Ok(packet)
    }
}

impl Decoder for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        let mut stream = serde_json::Deserializer::from_slice(data).into_iter::<Value>();
        let value = match stream.next() {
            None => return Ok(DecodeResult::Incomplete),
            Some(Err(e)) if e.is_eof() => return Ok(DecodeResult::Incomplete),
            Some(Err(e)) => return Err(Error::protocol(format!("json: {e}"))),
            Some(Ok(v)) => v,
        };
        let mut consumed = stream.byte_offset();
        while data.get(consumed) == Some(&b'\r') || data.get(consumed) == Some(&b'\n') {
            consumed += 1;
        }

        if !value.is_object() {
            return Err(Error::protocol("json: top-level value is not an object"));
        }
        let type_str = str_field(&value, "type")
            .ok_or_else(|| Error::protocol("json: missing type field"))?;

        let packet = match type_str {
            "header" => {
                self.parse_header(&value)?;
                Packet::new(PacketType::None, &[], [0u8; ID_LEN])
            }
            "Mode-AC" => self.parse_common(&value, PacketType::ModeAc)?,
            "Mode-S short" => self.parse_common(&value, PacketType::ModeSShort)?,
            "Mode-S long" => self.parse_common(&value, PacketType::ModeSLong)?,
            other => return Err(Error::protocol(format!("json: unknown type `{other}`"))),
        };

        Ok(DecodeResult::Decoded { packet, consumed })
    }
}

impl Serializer for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn hello(&mut self) -> Option<Vec<u8>> {
        if self.hello_sent {
            return None;
        }
        self.hello_sent = true;
        Some(build_hello(&self.ctx))
    }

    fn serialize(&mut self, packet: &Packet) -> Vec<u8> {
        if packet.kind == PacketType::None {
            return Vec::new();
        }
        let mut obj = json!({
            "type": packet.kind.wire_name(),
            "source_id": packet.source_id_str(),
            "hops": packet.hops,
            "payload": hex::encode_upper(packet.payload()),
        });
        if packet.mlat_timestamp != 0 {
            obj["mlat_timestamp"] = json!(packet.mlat_timestamp);
        }
        if packet.rssi != 0 {
            obj["rssi"] = json!(packet.rssi);
        }
        let mut out = serde_json::to_vec(&obj).expect("serde_json::Value always serializes");
        out.push(b'\n');
        out
    }
}

fn build_hello(ctx: &CodecContext) -> Vec<u8> {
    let obj = json!({
        "type": "header",
        "magic": JSON_MAGIC,
        "server_version": ctx.server_version,
        "server_id": ctx.server_id.as_str(),
        "mlat_timestamp_mhz": crate::packet::CANONICAL_MLAT_MHZ,
        "mlat_timestamp_max": u64::MAX,
        "rssi_max": u32::MAX,
    });
    let mut out = serde_json::to_vec(&obj).expect("serde_json::Value always serializes");
    out.push(b'\n');
    out
}

/// Builds a `CodecContext` for tests without going through the full
/// identity/startup path.
#[cfg(test)]
fn test_ctx() -> CodecContext {
    CodecContext { server_id: ServerId::generate(), server_version: "test" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_then_packet_round_trip() {
        let ctx = test_ctx();
        let mut codec = JsonCodec::new(ctx);

        let header = format!(
            "{{\"type\":\"header\",\"magic\":\"aDsB\",\"server_id\":\"someoneelse\",\"server_version\":\"x\",\"mlat_timestamp_mhz\":12,\"mlat_timestamp_max\":4095,\"rssi_max\":255}}\n"
        );
        let DecodeResult::Decoded { packet, consumed } = codec.decode(header.as_bytes()).unwrap() else {
            panic!("expected header to decode");
        };
        assert_eq!(packet.kind, PacketType::None);
        assert_eq!(consumed, header.len());

        let msg = "{\"type\":\"Mode-S long\",\"source_id\":\"src1\",\"hops\":1,\"payload\":\"8D4840D6202CC371C32CE0576098\",\"mlat_timestamp\":100,\"rssi\":128}\n";
        match codec.decode(msg.as_bytes()).unwrap() {
            DecodeResult::Decoded { packet, consumed } => {
                assert_eq!(packet.kind, PacketType::ModeSLong);
                assert_eq!(packet.source_id_str(), "src1");
                assert_eq!(consumed, msg.len());
                assert!(packet.mlat_timestamp > 0);
                assert!(packet.rssi > 0);
            }
            other => panic!("expected Decoded, got {other:?}"),
        }
    }

    #[test]
    fn own_server_id_is_rejected_as_loop() {
        let ctx = test_ctx();
        let mut codec = JsonCodec::new(ctx);
        let header = format!(
            "{{\"type\":\"header\",\"magic\":\"aDsB\",\"server_id\":\"{}\",\"server_version\":\"x\",\"mlat_timestamp_mhz\":12,\"mlat_timestamp_max\":4095,\"rssi_max\":255}}\n",
            ctx.server_id.as_str()
        );
        let err = codec.decode(header.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn packet_before_header_is_protocol_error() {
        let ctx = test_ctx();
        let mut codec = JsonCodec::new(ctx);
        let msg = "{\"type\":\"Mode-AC\",\"source_id\":\"src1\",\"hops\":0,\"payload\":\"0102\"}\n";
        assert!(codec.decode(msg.as_bytes()).is_err());
    }

    #[test]
    fn hello_emitted_exactly_once() {
        let ctx = test_ctx();
        let mut codec = JsonCodec::new(ctx);
        assert!(codec.hello().is_some());
        assert!(codec.hello().is_none());
    }

    #[test]
    fn incomplete_buffer_does_not_error() {
        let ctx = test_ctx();
        let mut codec = JsonCodec::new(ctx);
        assert!(matches!(codec.decode(b"{\"type\":\"hea").unwrap(), DecodeResult::Incomplete));
    }
}
