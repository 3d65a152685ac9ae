//! The process-wide state every running flow shares: codec context,
//! the send/receive registries, the idle-exit reference counters, and
//! shutdown coordination. See `DESIGN.md`'s `runtime` entry for why
//! this is an explicit value (spec §9's suggested fix for the
//! original's process-wide globals) rather than statics.

use std::rc::Rc;

use tokio_util::sync::CancellationToken;

use crate::codec::CodecContext;
use crate::error::Result;
use crate::flow::RefCounts;
use crate::identity::ServerId;
use crate::registry::{ReceiveRegistry, SendRegistry};

/// Version string advertised in JSON/proto hello headers.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state for one running process. Cheap to clone -- every field
/// is already reference-counted -- so each task gets its own handle
/// instead of reaching through a shared mutable global.
#[derive(Clone)]
pub struct Runtime {
    pub ctx: CodecContext,
    pub send: Rc<SendRegistry>,
    pub receive: Rc<ReceiveRegistry>,
    pub counts: RefCounts,
    pub shutdown: CancellationToken,
}

impl Runtime {
    pub fn new() -> Result<Self> {
        let ctx = CodecContext { server_id: ServerId::generate(), server_version: SERVER_VERSION };
        Ok(Runtime {
            ctx,
            send: Rc::new(SendRegistry::new(ctx)?),
            receive: Rc::new(ReceiveRegistry::new()),
            counts: RefCounts::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Watches the idle-exit condition (spec §8: "If all input
    /// endpoints close, the process exits within at most one loop
    /// iteration"; symmetrically for output endpoints). Resolves either
    /// when the runtime goes idle (triggering shutdown itself) or when
    /// shutdown has already been requested by something else (SIGINT,
    /// SIGTERM, a fatal config error).
    ///
    /// Driven by `RefCounts::changed()` rather than a polling interval,
    /// so the "at most one loop iteration" bound holds regardless of
    /// how long between events -- there's nothing to be late for.
    pub async fn watch_idle(&self) {
        loop {
            if self.counts.is_idle() {
                tracing::info!(category = "X", "no remaining inputs or outputs; shutting down");
                self.shutdown.cancel();
                return;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = self.counts.changed() => {}
            }
        }
    }
}
