//! Error taxonomy for `adsbus-core`.
//!
//! Only configuration errors and protocol errors are represented here.
//! Transient network failures (resolve/bind/connect/disconnect) are
//! handled inline by the connector and listener state machines with
//! exponential backoff and are never surfaced as `Err` values — see
//! `SPEC_FULL.md` §7. Resource exhaustion and invariant violations are
//! unrecoverable and are expressed as panics at the point of detection.

use std::fmt;

/// Errors that can terminate configuration or a single flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed endpoint spec or unknown format name. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecognised input, malformed frame, or a rescale parameter out of
    /// range. Closes the offending flow; never fatal to the process.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn protocol(msg: impl fmt::Display) -> Self {
        Error::Protocol(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
