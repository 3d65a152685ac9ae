//! The common packet record shared by every codec, and the MLAT/RSSI
//! rescaling that lets heterogeneous sources mix cleanly. See
//! `SPEC_FULL.md` §3 and §4.5.

/// Longest payload any packet type carries (Mode-S long, 14 bytes).
pub const PAYLOAD_LEN_MAX: usize = 14;

/// Length of a printable server/source identifier.
pub const ID_LEN: usize = 28;

/// The canonical MLAT counter rate: every rescaled timestamp is
/// expressed as a fraction of a 64-bit counter ticking as if at this
/// many MHz, regardless of what rate the originating source declared.
/// In MHz, not Hz -- the same unit as the `mhz` field declared by a
/// source header (spec §3: "the source's declared MHz (≤ 65535)"), so
/// it fits in the `u16` wire representation used by `proto`'s hello.
pub const CANONICAL_MLAT_MHZ: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Header-only: no payload, carries rescale parameters for the stream.
    None,
    ModeAc,
    ModeSShort,
    ModeSLong,
}

impl PacketType {
    pub fn payload_len(self) -> usize {
        match self {
            PacketType::None => 0,
            PacketType::ModeAc => 2,
            PacketType::ModeSShort => 7,
            PacketType::ModeSLong => 14,
        }
    }

    /// Name used by the JSON and stats formats.
    pub fn wire_name(self) -> Option<&'static str> {
        match self {
            PacketType::None => None,
            PacketType::ModeAc => Some("Mode-AC"),
            PacketType::ModeSShort => Some("Mode-S short"),
            PacketType::ModeSLong => Some("Mode-S long"),
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "Mode-AC" => Some(PacketType::ModeAc),
            "Mode-S short" => Some(PacketType::ModeSShort),
            "Mode-S long" => Some(PacketType::ModeSLong),
            _ => None,
        }
    }
}

/// A normalised ADS-B message, or a header-only `PacketType::None`
/// record carrying rescale parameters for its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    /// Only the first `kind.payload_len()` bytes are meaningful.
    pub payload: [u8; PAYLOAD_LEN_MAX],
    pub source_id: [u8; ID_LEN],
    pub hops: u16,
    /// Canonical-scale MLAT timestamp, 0 if absent.
    pub mlat_timestamp: u64,
    /// Canonical-scale RSSI, 0 if absent.
    pub rssi: u32,
}

impl Packet {
    pub fn new(kind: PacketType, payload: &[u8], source_id: [u8; ID_LEN]) -> Self {
        assert_eq!(payload.len(), kind.payload_len(), "payload length mismatch for packet kind");
        let mut buf = [0u8; PAYLOAD_LEN_MAX];
        buf[..payload.len()].copy_from_slice(payload);
        Packet {
            kind,
            payload: buf,
            source_id,
            hops: 0,
            mlat_timestamp: 0,
            rssi: 0,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.kind.payload_len()]
    }

    pub fn source_id_str(&self) -> &str {
        let end = self
            .source_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ID_LEN);
        std::str::from_utf8(&self.source_id[..end]).unwrap_or("")
    }
}

/// Per-stream MLAT rescaler state: the source's declared clock rate and
/// counter width, the last raw value seen, and a wrap counter used to
/// keep the canonical output monotonic across counter wraps.
#[derive(Debug, Clone)]
pub struct MlatState {
    mhz: u16,
    max_counter: u64,
    last_raw: Option<u64>,
    wraps: u64,
}

impl MlatState {
    pub fn new(mhz: u16, max_counter: u64) -> Self {
        MlatState {
            mhz,
            max_counter,
            last_raw: None,
            wraps: 0,
        }
    }

    /// Rescales a raw counter value (in the source's native rate and
    /// width) into the canonical 64-bit, `CANONICAL_MLAT_MHZ`-rate
    /// space, tracking wraps so that the canonical sequence stays
    /// non-decreasing even as the raw counter wraps around.
    ///
    /// Entirely `u128` arithmetic: `max_counter` is itself declared as a
    /// `u64` and a source is free to advertise `u64::MAX` (the value
    /// this process's own hello greetings use), so `max_counter + 1`
    /// and the absolute-position accumulation must not be done in `u64`.
    pub fn scale_in(&mut self, raw: u64) -> u64 {
        if let Some(last) = self.last_raw {
            // A large backward jump (more than half the counter range)
            // is treated as a wrap rather than clock jitter.
            if (raw as u128) + (self.max_counter as u128) / 2 < last as u128 {
                self.wraps += 1;
            }
        }
        self.last_raw = Some(raw);

        let period = self.max_counter as u128 + 1;
        let absolute = (self.wraps as u128).saturating_mul(period).saturating_add(raw as u128);

        // scaled = absolute * 2^64 / (period * (canonical_mhz / mhz))
        let denom = period * (CANONICAL_MLAT_MHZ as u128) / (self.mhz as u128).max(1);
        if denom == 0 {
            return 0;
        }
        // `absolute` can in principle be large enough that `<< 64`
        // overflows `u128` (a wrap against a near-`u64::MAX` period);
        // saturate to the canonical max rather than panic or silently
        // wrap in that unreachable-in-practice case.
        match absolute.checked_mul(1u128 << 64) {
            Some(numerator) => (numerator / denom).min(u64::MAX as u128) as u64,
            None => u64::MAX,
        }
    }
}

/// Linearly maps an RSSI sample in `[0, rssi_max]` to `[0, u32::MAX]`.
pub fn rssi_scale_in(value: u32, rssi_max: u32) -> u32 {
    if rssi_max == 0 {
        return 0;
    }
    let scaled = (value as u64) * (u32::MAX as u64) / (rssi_max as u64);
    scaled.min(u32::MAX as u64) as u32
}
