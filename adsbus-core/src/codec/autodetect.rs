//! Autodetecting receive dispatcher: tries each text parser in a fixed
//! order against the front of the buffer, latching the first one that
//! successfully decodes a message for the remainder of the stream.
//!
//! Order and membership mirror the original parser table: airspy_adsb,
//! beast, raw. JSON and proto are excluded -- both require an explicit
//! header/hello handshake rather than a bare leading-byte sniff, so a
//! flow that wants one of them names it explicitly instead of `auto`.

use crate::codec::{airspy::AirspyCodec, beast::BeastCodec, raw::RawCodec, DecodeResult, Decoder};
use crate::error::Result;

pub struct Detector {
    candidates: Vec<Box<dyn Decoder>>,
    latched: Option<Box<dyn Decoder>>,
}

impl Detector {
    pub fn new() -> Self {
        Detector {
            candidates: vec![
                Box::new(AirspyCodec::new()) as Box<dyn Decoder>,
                Box::new(BeastCodec::new()) as Box<dyn Decoder>,
                Box::new(RawCodec::new()) as Box<dyn Decoder>,
            ],
            latched: None,
        }
    }

    /// Name of the format latched onto this stream, once detected.
    pub fn detected_format(&self) -> Option<&'static str> {
        self.latched.as_deref().map(Decoder::name)
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Detector {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn decode(&mut self, data: &[u8]) -> Result<DecodeResult> {
        if let Some(decoder) = self.latched.as_mut() {
            return decoder.decode(data);
        }

        for index in 0..self.candidates.len() {
            match self.candidates[index].decode(data)? {
                DecodeResult::NoMatch | DecodeResult::Incomplete => continue,
                decoded @ DecodeResult::Decoded { .. } => {
                    self.latched = Some(self.candidates.swap_remove(index));
                    return Ok(decoded);
                }
            }
        }

        // None of the fixed-order parsers recognised the buffer yet.
        // Whether this means "not enough data" or "never will" is left
        // to the caller, which closes the connection once the buffer
        // fills without any parser ever succeeding (spec §4.5).
        Ok(DecodeResult::Incomplete)
    }
}
