//! `exec` transport: spawns a subprocess and binds its stdin (send
//! direction) and/or stdout (receive direction) to a flow. Subprocess
//! exit closes the pipe(s); per spec §9 ("by parallel construction"
//! with outgoing's backoff, since retry for non-socket sources was
//! only ever a `TODO` in the original), the transport is respawned on
//! the same backoff schedule as a dropped TCP connection.

use std::process::Stdio;

use crate::backoff;
use crate::endpoint;
use crate::flow::Direction;
use crate::runtime::Runtime;

pub async fn run(runtime: Runtime, command: String, format: String, label: String) {
    let direction = match endpoint::classify(&format) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(category = "R", "{label}: {e}");
            runtime.shutdown.cancel();
            return;
        }
    };
    let category = category_for(direction);
    let _guard = runtime.counts.acquire(direction);

    let mut attempt: u32 = 0;
    loop {
        tokio::select! {
            _ = runtime.shutdown.cancelled() => return,
            outcome = spawn_and_serve(&runtime, &command, &format, &label, direction, category) => {
                match outcome {
                    Ok(()) => tracing::info!(category, "{label}: subprocess exited; restarting..."),
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

/// Log category for transport-level (spawn/retry) messages: 'R' for a
/// receive-only endpoint, 'S' otherwise. A bidirectional exec endpoint
/// logs its transport lifecycle under 'S' and lets the per-direction
/// loops in `endpoint` speak for themselves once running.
fn category_for(direction: Direction) -> &'static str {
    match direction {
        Direction::Receive => "R",
        Direction::Send | Direction::Bidirectional => "S",
    }
}

async fn spawn_and_serve(
    runtime: &Runtime,
    command: &str,
    format: &str,
    label: &str,
    direction: Direction,
    category: &'static str,
) -> std::io::Result<()> {
    let mut cmd = tokio::process::Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(if matches!(direction, Direction::Send | Direction::Bidirectional) {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if matches!(direction, Direction::Receive | Direction::Bidirectional) {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    tracing::info!(category, "{label}: spawned `{command}` (pid {})", child.id().unwrap_or(0));

    let stdout = child.stdout.take();
    let stdin = child.stdin.take();

    let serve = async move {
        match (stdout, stdin) {
            (Some(mut out), Some(mut inp)) => {
                let recv = endpoint::receive_only(runtime, &mut out, format, label);
                let send = endpoint::send_only(runtime, &mut inp, format);
                let (r, s) = tokio::join!(recv, send);
                r.and(s)
            }
            (Some(mut out), None) => endpoint::receive_only(runtime, &mut out, format, label).await,
            (None, Some(mut inp)) => endpoint::send_only(runtime, &mut inp, format).await,
            (None, None) => Ok(()),
        }
    };

    let result = tokio::select! {
        r = serve => r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        status = child.wait() => status.map(|_| ()),
    };

    let _ = child.kill().await;
    result
}
