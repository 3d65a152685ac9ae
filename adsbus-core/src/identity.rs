//! Process-lifetime server identity, used for human-readable logging
//! and as the loop-detection token embedded in JSON/proto headers.
//! Generated once at startup -- the Rust analogue of the teacher's
//! `Bip39Seed::new`, minus the persistence step (the spec only needs a
//! process-lifetime identifier, not a durable secret).

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::packet::ID_LEN;

/// A 28-byte printable identifier, safe to embed unquoted in a JSON
/// string (spec §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerId([u8; ID_LEN]);

impl ServerId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; ID_LEN];
        for b in bytes.iter_mut() {
            *b = rng.sample(Alphanumeric);
        }
        ServerId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("Alphanumeric only ever produces ASCII")
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders bytes as lowercase hex, mirroring the teacher's
/// `ln_dlc_node::util::hex_str`.
pub fn hex_str(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
