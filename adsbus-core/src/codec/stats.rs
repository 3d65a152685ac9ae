//! `stats`: output-only format. Emits a JSON snapshot every 1,000
//! packets observed, carrying uptime and per-type counters. Never
//! registered as a receive format.

use serde_json::json;
use std::time::Instant;

use crate::codec::Serializer;
use crate::packet::{Packet, PacketType};

pub struct StatsCodec {
    total_count: u64,
    mode_ac_count: u64,
    mode_s_short_count: u64,
    mode_s_long_count: u64,
    start: Instant,
}

impl StatsCodec {
    pub fn new() -> Self {
        StatsCodec {
            total_count: 0,
            mode_ac_count: 0,
            mode_s_short_count: 0,
            mode_s_long_count: 0,
            start: Instant::now(),
        }
    }
}

impl Default for StatsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for StatsCodec {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn serialize(&mut self, packet: &Packet) -> Vec<u8> {
        // A header-only record carries rescale parameters, not a
        // packet; it must not advance the 1000-packet threshold or its
        // own per-type count would never be incremented, throwing the
        // threshold and the per-type totals out of sync.
        if packet.kind == PacketType::None {
            return Vec::new();
        }
        self.total_count += 1;
        match packet.kind {
            PacketType::None => unreachable!("returned above"),
            PacketType::ModeAc => self.mode_ac_count += 1,
            PacketType::ModeSShort => self.mode_s_short_count += 1,
            PacketType::ModeSLong => self.mode_s_long_count += 1,
        }

        if self.total_count % 1000 != 0 {
            return Vec::new();
        }

        let out = json!({
            "uptime_seconds": self.start.elapsed().as_secs(),
            "packet_counts": {
                "Mode-AC": self.mode_ac_count,
                "Mode-S short": self.mode_s_short_count,
                "Mode-S long": self.mode_s_long_count,
            },
        });
        let mut bytes = serde_json::to_vec(&out).expect("serde_json::Value always serializes");
        bytes.push(b'\n');
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ID_LEN;

    #[test]
    fn emits_only_every_thousandth_packet() {
        let mut stats = StatsCodec::new();
        let packet = Packet::new(PacketType::ModeSLong, &[0u8; 14], [0u8; ID_LEN]);

        for _ in 0..999 {
            assert!(stats.serialize(&packet).is_empty());
        }
        let snapshot = stats.serialize(&packet);
        assert!(!snapshot.is_empty());
        let value: serde_json::Value = serde_json::from_slice(&snapshot).unwrap();
        assert_eq!(value["packet_counts"]["Mode-S long"], 1000);
    }

    #[test]
    fn header_records_are_not_counted() {
        let mut stats = StatsCodec::new();
        let header = Packet::new(PacketType::None, &[], [0u8; ID_LEN]);
        let packet = Packet::new(PacketType::ModeSShort, &[0u8; 7], [0u8; ID_LEN]);

        for _ in 0..5 {
            assert!(stats.serialize(&header).is_empty());
        }
        for _ in 0..999 {
            assert!(stats.serialize(&packet).is_empty());
        }
        let snapshot = stats.serialize(&packet);
        assert!(!snapshot.is_empty(), "1000 real packets must still trip the threshold");
        let value: serde_json::Value = serde_json::from_slice(&snapshot).unwrap();
        assert_eq!(value["packet_counts"]["Mode-S short"], 1000);
    }
}
