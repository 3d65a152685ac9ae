//! `tracing-subscriber` initialisation: env filter, ANSI detection, UTC
//! timestamps, and a choice between JSON and the category-letter plain
//! format from `adsbus_core::log`. Near-verbatim in shape to
//! `coordinator/src/logger.rs::init_tracing` -- same `EnvFilter`
//! construction, `atty::is` check, `UtcTime` timer, JSON/plain branch --
//! minus the `console_subscriber`/tokio-console layer, which this
//! process has no use for.

use std::path::PathBuf;

use anyhow::{Context, Result};
use time::macros::format_description;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use adsbus_core::log::{CategoryFormat, LogSink};

const RUST_LOG_ENV: &str = "RUST_LOG";

/// Opens the configured log destination and installs it as the global
/// `tracing` subscriber. Returns the `LogSink` handle so `main` can
/// trigger rotation on SIGHUP.
pub fn init(level: LevelFilter, json: bool, log_path: Option<PathBuf>) -> Result<LogSink> {
    let sink = LogSink::open(log_path).context("failed to open --log path")?;
    let is_terminal = atty::is(atty::Stream::Stderr);

    let mut filter = EnvFilter::new("").add_directive(Directive::from(level));

    if let Some(Ok(env)) = std::env::var_os(RUST_LOG_ENV).map(|s| s.into_string()) {
        for directive in env.split(',') {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                #[allow(clippy::print_stderr)]
                Err(e) => eprintln!("WARN ignoring log directive `{directive}`: {e}"),
            }
        }
    }

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(sink.clone()).with_ansi(is_terminal);
    let fmt_layer = if json {
        fmt_layer.json().with_timer(UtcTime::rfc_3339()).boxed()
    } else {
        fmt_layer
            .event_format(CategoryFormat)
            .with_timer(UtcTime::new(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            )))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(sink)
}
