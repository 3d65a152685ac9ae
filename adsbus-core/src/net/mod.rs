//! TCP transport: the outgoing connector and incoming listener state
//! machines, and the raw socket hygiene they share.

pub mod incoming;
pub mod outgoing;
pub mod socket;
