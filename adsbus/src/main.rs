//! Composition root: parse CLI options, init logging, build the core
//! `Runtime`, register every configured endpoint, then drive the
//! `tokio::task::LocalSet` until shutdown. Mirrors
//! `original_source/adsbus/adsbus.c`'s `main()` init/cleanup ordering
//! and `maker/src/bin/maker.rs`'s panic-hook + logger-init + run shape.

mod cli;
mod logger;

use std::backtrace::Backtrace;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::LocalSet;

use adsbus_core::log::LogSink;
use adsbus_core::runtime::Runtime;
use adsbus_core::transport::{exec, file, stdio, STDIO_PATH};
use adsbus_core::{net::incoming, net::outgoing};

fn main() -> Result<()> {
    std::panic::set_hook(
        #[allow(clippy::print_stderr)]
        Box::new(|info| {
            let backtrace = Backtrace::force_capture();
            tracing::error!(%info, "aborting after panic in task");
            eprintln!("{backtrace}");
            std::process::abort()
        }),
    );

    // Spec §6.4: SIGPIPE is ignored globally; failed writes surface as
    // ordinary `Err`s (a closed-socket write returns EPIPE) instead of
    // killing the process.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let opts = cli::Opts::parse();
    let level = opts.log_level.parse().unwrap_or(tracing::metadata::LevelFilter::INFO);
    let log_sink = logger::init(level, opts.json, opts.log.clone())?;

    let tokio_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    LocalSet::new().block_on(&tokio_runtime, run(opts, log_sink))
}

async fn run(opts: cli::Opts, log_sink: LogSink) -> Result<()> {
    if opts.connect.is_empty() && opts.listen.is_empty() && opts.exec.is_empty() && opts.file.is_empty() {
        anyhow::bail!("no endpoints configured; pass at least one of --connect/--listen/--exec/--file");
    }

    let bus = Runtime::new().context("failed to initialise runtime")?;
    tracing::info!(category = "X", "server id {}", bus.ctx.server_id);

    for spec in opts.connect {
        let label = format!("connect {}={}/{}", spec.format, spec.host, spec.port);
        tokio::task::spawn_local(outgoing::run(bus.clone(), spec.host, spec.port, spec.format, label));
    }
    for spec in opts.listen {
        let label = format!(
            "listen {}={}/{}",
            spec.format,
            spec.host.as_deref().unwrap_or(""),
            spec.port
        );
        tokio::task::spawn_local(incoming::run(bus.clone(), spec.host, spec.port, spec.format, label));
    }
    for spec in opts.exec {
        let label = format!("exec {}={}", spec.format, spec.value);
        tokio::task::spawn_local(exec::run(bus.clone(), spec.value, spec.format, label));
    }
    for spec in opts.file {
        let label = format!("file {}={}", spec.format, spec.value);
        if spec.value == STDIO_PATH {
            tokio::task::spawn_local(stdio::run(bus.clone(), spec.format, label));
        } else {
            tokio::task::spawn_local(file::run(bus.clone(), spec.value, spec.format, label));
        }
    }

    let idle_watcher = bus.clone();
    tokio::task::spawn_local(async move { idle_watcher.watch_idle().await });

    wait_for_shutdown(&bus, &log_sink).await;
    tracing::info!(category = "X", "shutdown complete");
    Ok(())
}

/// Drives the self-pipe equivalent of spec §4.4/§6.4: SIGINT/SIGTERM
/// request an orderly shutdown, SIGHUP rotates the log and otherwise
/// changes nothing. Returns once shutdown has been requested by any
/// source, including the idle-exit policy in `Runtime::watch_idle`.
async fn wait_for_shutdown(bus: &Runtime, log_sink: &LogSink) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    loop {
        tokio::select! {
            _ = bus.shutdown.cancelled() => return,
            _ = sigint.recv() => {
                tracing::info!(category = "X", "received SIGINT; shutting down");
                bus.shutdown.cancel();
                return;
            }
            _ = sigterm.recv() => {
                tracing::info!(category = "X", "received SIGTERM; shutting down");
                bus.shutdown.cancel();
                return;
            }
            _ = sighup.recv() => {
                if let Err(e) = log_sink.rotate() {
                    tracing::warn!(category = "L", "log rotation failed: {e}");
                }
            }
        }
    }
}
