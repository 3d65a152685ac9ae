//! `stdio` transport: binds the process's own standard input and/or
//! output at startup. Selected via the reserved `--file <fmt>=-` path
//! (`transport::STDIO_PATH`) rather than a dedicated flag, since spec
//! §6.1 names no separate CLI option for the `stdinout` module. Unlike
//! `exec`/`file`, there's nothing to reconnect to once the process's
//! own stdio closes, so this runs once.

use crate::endpoint;
use crate::flow::Direction;
use crate::runtime::Runtime;

pub async fn run(runtime: Runtime, format: String, label: String) {
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

    let result = match direction {
        Direction::Receive => {
            let mut stdin = tokio::io::stdin();
            endpoint::receive_only(&runtime, &mut stdin, &format, &label).await
        }
        Direction::Send => {
            let mut stdout = tokio::io::stdout();
            endpoint::send_only(&runtime, &mut stdout, &format).await
        }
        Direction::Bidirectional => {
            let mut stdin = tokio::io::stdin();
            let mut stdout = tokio::io::stdout();
            let recv = endpoint::receive_only(&runtime, &mut stdin, &format, &label);
            let send = endpoint::send_only(&runtime, &mut stdout, &format);
            let (r, s) = tokio::join!(recv, send);
            r.and(s)
        }
    };

    if let Err(e) = result {
        tracing::warn!(category, "{label}: {e}");
    }
}
