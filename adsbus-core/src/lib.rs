//! Core of the ADS-B telemetry bus: the packet model and wire codecs,
//! the flow/registry abstractions that bind a transport endpoint to a
//! direction and format, the outgoing/incoming connection state
//! machines, the non-socket transports, and the `Runtime` value that
//! ties them together (spec §2, realised per `SPEC_FULL.md` §2/§9 as an
//! explicit value rather than process-wide globals).
//!
//! Everything here runs on a single `tokio::task::LocalSet` (see
//! `runtime::Runtime`); nothing in this crate is `Send`, by design --
//! that is the literal Rust expression of the spec's single-threaded,
//! lock-free concurrency model (§5).

pub mod backoff;
pub mod buffer;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod flow;
pub mod identity;
pub mod log;
pub mod net;
pub mod packet;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod transport;

pub use error::{Error, Result};
pub use runtime::Runtime;
