//! `proto` format: a length-delimited binary record carrying the same
//! fields as `json` (spec §4.5) -- a `u32` big-endian body length
//! followed by a one-byte record type, then either a header record
//! (rescale parameters + peer identity) or a packet record (source id,
//! hops, hex-free binary payload, optional MLAT/RSSI).

use crate::codec::{CodecContext, DecodeResult, Decoder, Serializer};
use crate::error::{Error, Result};
use crate::packet::{MlatState, Packet, PacketType, ID_LEN};

const MAGIC: &[u8; 4] = b"aDsB";

const RECORD_HEADER: u8 = 0;
const RECORD_MODE_AC: u8 = 1;
const RECORD_MODE_S_SHORT: u8 = 2;
const RECORD_MODE_S_LONG: u8 = 3;

const FLAG_MLAT: u8 = 0b01;
const FLAG_RSSI: u8 = 0b10;

fn record_byte(kind: PacketType) -> Option<u8> {
    match kind {
        PacketType::None => None,
        PacketType::ModeAc => Some(RECORD_MODE_AC),
        PacketType::ModeSShort => Some(RECORD_MODE_S_SHORT),
        PacketType::ModeSLong => Some(RECORD_MODE_S_LONG),
    }
}

fn kind_for_record(byte: u8) -> Option<PacketType> {
    match byte {
        RECORD_MODE_AC => Some(PacketType::ModeAc),
        RECORD_MODE_S_SHORT => Some(PacketType::ModeSShort),
        RECORD_MODE_S_LONG => Some(PacketType::ModeSLong),
        _ => None,
    }
}

struct HeaderState {
    mlat: MlatState,
    rssi_max: u32,
}

pub struct ProtoCodec {
    ctx: CodecContext,
    header: Option<HeaderState>,
    hello_sent: bool,
}

impl ProtoCodec {
    pub fn new(ctx: CodecContext) -> Self {
        ProtoCodec { ctx, header: None, hello_sent: false }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| Error::protocol("proto: truncated record"))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn fixed_id(&mut self) -> Result<[u8; ID_LEN]> {
        self.take(ID_LEN)?.try_into().map_err(|_| Error::protocol("proto: bad id field"))
    }
}

impl ProtoCodec {
    fn decode_header(&mut self, r: &mut Reader) -> Result<()> {
        let magic: [u8; 4] = r.take(4)?.try_into().unwrap();
        if &magic != MAGIC {
            return Err(Error::protocol("proto: bad magic"));
        }
        let server_id = r.fixed_id()?;
        let mhz = r.u16()?;
        let max_counter = r.u64()?;
        let rssi_max = r.u32()?;

        if mhz == 0 || max_counter == 0 || rssi_max == 0 {
            return Err(Error::protocol("proto: rescale parameters out of range"));
        }
        if server_id == *self.ctx.server_id.as_bytes() {
            return Err(Error::protocol("proto: peer server_id matches ours; loop detected"));
        }

        self.header = Some(HeaderState { mlat: MlatState::new(mhz, max_counter), rssi_max });
        Ok(())
    }

    fn decode_packet(&mut self, r: &mut Reader, kind: PacketType) -> Result<Packet> {
        let state = self
            .header
            .as_mut()
            .ok_or_else(|| Error::protocol("proto: packet received before header"))?;

        let source_id = r.fixed_id()?;
        let hops = r.u16()?;
        let flags = r.u8()?;
        let payload = r.take(kind.payload_len())?.to_vec();

        let mut packet = Packet::new(kind, &payload, source_id);
        packet.hops = hops;

        if flags & FLAG_MLAT != 0 {
            let raw = r.u64()?;
            packet.mlat_timestamp = state.mlat.scale_in(raw);
        }
        if flags & FLAG_RSSI != 0 {
            let raw = r.u32()?;
            if raw > state.rssi_max {
                return Err(Error::protocol("proto: rssi exceeds declared rssi_max"));
            }
            packet.rssi = crate::packet::rssi_scale_in(raw, state.rssi_max);
        }

        Ok(packet)
    }
}

impl Decoder for ProtoCodec {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        if data.len() < 4 {
            return Ok(DecodeResult::Incomplete);
        }
        let body_len = u32::from_be_bytes(data[..4].try_into().unwrap()) as usize;
        let total = 4 + body_len;
        if data.len() < total {
            return Ok(DecodeResult::Incomplete);
        }
        let body = &data[4..total];

        let mut r = Reader::new(body);
        let record_type = r.u8()?;

        let packet = if record_type == RECORD_HEADER {
            self.decode_header(&mut r)?;
            Packet::new(PacketType::None, &[], [0u8; ID_LEN])
        } else {
            let kind = kind_for_record(record_type)
                .ok_or_else(|| Error::protocol("proto: unknown record type"))?;
            self.decode_packet(&mut r, kind)?
        };

        Ok(DecodeResult::Decoded { packet, consumed: total })
    }
}

impl Serializer for ProtoCodec {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn hello(&mut self) -> Option<Vec<u8>> {
        if self.hello_sent {
            return None;
        }
        self.hello_sent = true;

        let mut body = Vec::new();
        body.push(RECORD_HEADER);
        body.extend_from_slice(MAGIC);
        body.extend_from_slice(self.ctx.server_id.as_bytes());
        body.extend_from_slice(&(crate::packet::CANONICAL_MLAT_MHZ as u16).to_be_bytes());
        body.extend_from_slice(&u64::MAX.to_be_bytes());
        body.extend_from_slice(&u32::MAX.to_be_bytes());

        Some(frame(&body))
    }

    fn serialize(&mut self, packet: &Packet) -> Vec<u8> {
        let Some(record_type) = record_byte(packet.kind) else {
            return Vec::new();
        };

        let mut body = Vec::new();
        body.push(record_type);
        body.extend_from_slice(&packet.source_id);
        body.extend_from_slice(&packet.hops.to_be_bytes());

        let mut flags = 0u8;
        if packet.mlat_timestamp != 0 {
            flags |= FLAG_MLAT;
        }
        if packet.rssi != 0 {
            flags |= FLAG_RSSI;
        }
        body.push(flags);
        body.extend_from_slice(packet.payload());
        if packet.mlat_timestamp != 0 {
            body.extend_from_slice(&packet.mlat_timestamp.to_be_bytes());
        }
        if packet.rssi != 0 {
            body.extend_from_slice(&packet.rssi.to_be_bytes());
        }

        frame(&body)
    }
}

fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}
