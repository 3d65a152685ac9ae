//! `file` transport: opens a path in read+append mode so the same
//! binding serves whichever direction(s) its format supports, and
//! reuses `endpoint::serve_duplex` directly (`tokio::fs::File`
//! implements `AsyncRead`/`AsyncWrite`/`AsRawFd`). Regular-file reads
//! never block indefinitely, so there's no "always-trigger" poll loop
//! to build on top of it -- see `SPEC_FULL.md` §4.9.

use tokio::fs::OpenOptions;

use crate::backoff;
use crate::endpoint;
use crate::flow::Direction;
use crate::runtime::Runtime;

pub async fn run(runtime: Runtime, path: String, format: String, label: String) {
    let direction = match endpoint::classify(&format) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(category = "R", "{label}: {e}");
            runtime.shutdown.cancel();
            return;
        }
    };
    let category = match direction {
        Direction::Receive => "R",
        Direction::Send | Direction::Bidirectional => "S",
    };
    let _guard = runtime.counts.acquire(direction);

    let mut attempt: u32 = 0;
    loop {
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            outcome = open_and_serve(&runtime, &path, &format, &label) => {
                match outcome {
                    Ok(()) => tracing::info!(category, "{label}: reached end of file; retrying..."),
                    Err(e) => tracing::warn!(category, "{label}: {e}"),
                }
            }
        }

        let delay = backoff::retry_delay(attempt);
        attempt += 1;
        tracing::info!(category, "{label}: will retry in {}s", delay.as_secs());
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn open_and_serve(runtime: &Runtime, path: &str, format: &str, label: &str) -> std::io::Result<()> {
    let file = OpenOptions::new().read(true).append(true).create(true).open(path).await?;
    endpoint::serve_duplex(runtime, file, format, label, false)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}
