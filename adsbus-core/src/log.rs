//! Line-oriented log sink (spec §4.10): `<category> <id>: <message>`
//! lines, where `id` is already folded into `<message>` by call sites
//! that pass a flow label (`tracing::info!(category = "O", "{label}:
//! ...")`), plus rotation on a hang-up signal.
//!
//! `LogSink` is the reopenable destination (a file, or stderr when no
//! `--log` path is given); `CategoryFormat` is the `tracing_subscriber`
//! event formatter that renders the `<category> <message>` line shape.
//! The two compose in `adsbus::logger::init`, mirroring the split
//! between `tracing_subscriber::fmt::MakeWriter` and
//! `tracing_subscriber::fmt::FormatEvent` used throughout
//! `coordinator/src/logger.rs`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::format::Writer as FmtWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

enum Dest {
    Stderr,
    File { path: PathBuf, file: File },
}

impl Dest {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Dest::Stderr => io::stderr().write_all(bytes),
            Dest::File { file, .. } => file.write_all(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Dest::Stderr => io::stderr().flush(),
            Dest::File { file, .. } => file.flush(),
        }
    }
}

struct Inner {
    dest: Dest,
    log_id: String,
}

/// Cheap-to-clone handle to the process's log destination. Every
/// `tracing` event is written through a fresh clone (`make_writer`),
/// the same pattern `tracing_appender::non_blocking` uses internally --
/// the `Arc<Mutex<_>>` is what actually owns the destination.
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<Inner>>);

impl LogSink {
    /// Opens `path` in append mode, or writes to stderr if `path` is
    /// `None`. Generates the first log-id.
    pub fn open(path: Option<PathBuf>) -> io::Result<Self> {
        let dest = match path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                Dest::File { path, file }
            }
            None => Dest::Stderr,
        };
        Ok(LogSink(Arc::new(Mutex::new(Inner { dest, log_id: generate_log_id() }))))
    }

    /// The identifier naming the current log segment, distinct from
    /// the process's `ServerId` -- this one changes on every rotation.
    pub fn log_id(&self) -> String {
        self.0.lock().expect("log sink mutex poisoned").log_id.clone()
    }

    /// Re-opens the log file at its original path (spec §4.10: "re-open
    /// the path, continue"), then writes a switch marker line naming
    /// both the old and new log-ids. A no-op besides generating a fresh
    /// id when logging to stderr, which has nothing to reopen.
    pub fn rotate(&self) -> io::Result<()> {
        let mut inner = self.0.lock().expect("log sink mutex poisoned");
        let old_id = inner.log_id.clone();
        let new_id = generate_log_id();

        if let Dest::File { path, file } = &mut inner.dest {
            *file = OpenOptions::new().create(true).append(true).open(path.as_path())?;
        }

        let marker = format!("L {old_id}: log rotated, switching to {new_id}\n");
        inner.dest.write_all(marker.as_bytes())?;
        inner.dest.flush()?;
        inner.log_id = new_id;
        Ok(())
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().expect("log sink mutex poisoned");
        inner.dest.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("log sink mutex poisoned").dest.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn generate_log_id() -> String {
    use rand::Rng;
    let bytes: [u8; 4] = rand::thread_rng().gen();
    crate::identity::hex_str(&bytes)
}

/// `tracing_subscriber` event formatter rendering `<category> <message>`
/// lines (spec §4.10's categories: 'I' incoming, 'O' outgoing, 'S'
/// send, 'R' receive, 'X' system, 'L' log-itself). Falls back to 'X'
/// for events with no `category` field, which should not happen for
/// anything logged through this crate but keeps the formatter total.
pub struct CategoryFormat;

impl<S, N> FormatEvent<S, N> for CategoryFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: FmtWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let mut category = 'X';
        event.record(&mut CategoryVisitor(&mut category));

        write!(writer, "{category} ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct CategoryVisitor<'a>(&'a mut char);

impl tracing::field::Visit for CategoryVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "category" {
            if let Some(c) = value.chars().next() {
                *self.0 = c;
            }
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "category" {
            if let Some(c) = format!("{value:?}").trim_matches('"').chars().next() {
                *self.0 = c;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Mutex as StdMutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuf {
        type Writer = SharedBuf;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn category_prefixes_the_rendered_line() {
        let buf = SharedBuf(Arc::new(StdMutex::new(Vec::new())));
        let subscriber = tracing_subscriber::fmt()
            .event_format(CategoryFormat)
            .with_writer(buf.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(category = "O", "hello from a test");
        });

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(output.starts_with("O "), "got: {output:?}");
        assert!(output.contains("hello from a test"));
    }

    #[test]
    fn file_sink_appends_and_rotates_with_a_marker() {
        let path = std::env::temp_dir().join(format!("adsbus-log-test-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = LogSink::open(Some(path.clone())).unwrap();
        let first_id = sink.log_id();
        {
            let mut w = sink.clone();
            w.write_all(b"first line\n").unwrap();
        }
        sink.rotate().unwrap();
        let second_id = sink.log_id();
        assert_ne!(first_id, second_id);
        {
            let mut w = sink.clone();
            w.write_all(b"second line\n").unwrap();
        }

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("first line"));
        assert!(contents.contains(&format!("log rotated, switching to {second_id}")));
        assert!(contents.contains("second line"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stderr_sink_rotation_is_harmless() {
        let sink = LogSink::open(None).unwrap();
        let before = sink.log_id();
        sink.rotate().unwrap();
        assert_ne!(before, sink.log_id());
    }
}
