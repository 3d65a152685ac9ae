//! Send/receive registries: per-format subscriber fan-out for the send
//! direction (spec §4.6/§3), and a lightweight live-entity list for the
//! receive direction used for diagnostics and teardown.
//!
//! The send registry keeps exactly one live `Serializer` instance per
//! format for the process's lifetime -- the same shape as the
//! original's single static `stats_state`, where per-1000-packet
//! counting is process-wide rather than per-connection. Hello
//! greetings, by contrast, are generated fresh for each subscriber (a
//! brand-new `Serializer` built just to call `hello()` once and
//! discarded), since every newly connected subscriber needs its own
//! greeting regardless of how many earlier subscribers already got
//! theirs.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tokio::sync::mpsc;

use crate::codec::{self, CodecContext, Serializer};
use crate::error::{Error, Result};
use crate::packet::Packet;

/// Fixed broadcast order, matching `codec::is_known_send_format`.
const SEND_FORMATS: [&str; 5] = ["raw", "beast", "json", "proto", "stats"];

/// A live outbound write half. Bytes pushed here are carried by an
/// unbounded channel to the task that owns the underlying socket, file,
/// or pipe and actually performs the write.
pub struct Subscriber {
    pub format: &'static str,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Subscriber {
    /// Queues `bytes` for the owning task to write. Returns `false` if
    /// the owning task (and its receiver) has already gone away.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(bytes).is_ok()
    }
}

struct FormatSlot {
    name: &'static str,
    serializer: Box<dyn Serializer>,
    subscribers: Vec<Weak<Subscriber>>,
}

/// Per-format subscriber lists plus the fixed-order broadcast used by
/// `send.broadcast(packet)` (spec §4.6).
pub struct SendRegistry {
    slots: RefCell<Vec<FormatSlot>>,
}

impl SendRegistry {
    pub fn new(ctx: CodecContext) -> Result<Self> {
        let mut slots = Vec::with_capacity(SEND_FORMATS.len());
        for &name in &SEND_FORMATS {
            slots.push(FormatSlot {
                name,
                serializer: codec::make_serializer(name, ctx)?,
                subscribers: Vec::new(),
            });
        }
        Ok(SendRegistry { slots: RefCell::new(slots) })
    }

    /// Registers a new subscriber for `format`. Returns its write
    /// handle and the one-off hello greeting to send before anything
    /// else, if the format defines one.
    pub fn subscribe(
        &self,
        format: &str,
        ctx: CodecContext,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(Rc<Subscriber>, Option<Vec<u8>>)> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots
            .iter_mut()
            .find(|slot| slot.name == format)
            .ok_or_else(|| Error::config(format!("unknown send format `{format}`")))?;

        let hello = codec::make_serializer(format, ctx)?.hello();
        let handle = Rc::new(Subscriber { format: slot.name, tx });
        slot.subscribers.push(Rc::downgrade(&handle));
        Ok((handle, hello))
    }

    pub fn has_subscribers(&self, format: &str) -> bool {
        self.slots
            .borrow()
            .iter()
            .find(|slot| slot.name == format)
            .is_some_and(|slot| slot.subscribers.iter().any(|w| w.upgrade().is_some()))
    }

    /// Serialises `packet` at most once per format with at least one
    /// live subscriber, writing the result to every subscriber of that
    /// format in turn. Dead subscribers are pruned opportunistically.
    /// A format whose serializer returns an empty buffer (e.g. `stats`
    /// below its threshold) is a legal no-op for that format this call.
    pub fn broadcast(&self, packet: &Packet) {
        let mut slots = self.slots.borrow_mut();
        for slot in slots.iter_mut() {
            slot.subscribers.retain(|w| w.strong_count() > 0);
            if slot.subscribers.is_empty() {
                continue;
            }
            let bytes = slot.serializer.serialize(packet);
            if bytes.is_empty() {
                continue;
            }
            for weak in &slot.subscribers {
                if let Some(subscriber) = weak.upgrade() {
                    let _ = subscriber.send(bytes.clone());
                }
            }
        }
    }
}

/// A live receive-direction entity, tracked only for introspection and
/// bulk teardown -- unlike send, receive has no per-format fan-out.
pub struct ReceiveHandle {
    pub source: String,
}

#[derive(Default)]
pub struct ReceiveRegistry {
    entries: RefCell<Vec<Weak<ReceiveHandle>>>,
}

impl ReceiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: impl Into<String>) -> Rc<ReceiveHandle> {
        let handle = Rc::new(ReceiveHandle { source: source.into() });
        self.entries.borrow_mut().push(Rc::downgrade(&handle));
        handle
    }

    /// Number of currently live receive entities, pruning dead entries
    /// as a side effect.
    pub fn live_count(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|w| w.strong_count() > 0);
        entries.len()
    }
}
