//! Unix-socket server loop: accept, spawn, read lines, write lines.

use std::{
    io::ErrorKind,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
};
use tracing::{error, info, warn};

use crate::error::BridgeResult;

use super::protocol::handle_line;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Bind `socket_path` and serve forever. A stale socket file from a
/// previous run is removed before binding; any other bind failure is
/// propagated.
pub async fn run(socket_path: &Path) -> BridgeResult<()> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => warn!(path = %socket_path.display(), "removed stale socket file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        info!(connection_id, "accepted connection");

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream).await {
                error!(connection_id, error = %e, "connection failed");
            } else {
                info!(connection_id, "connection closed");
            }
        });
    }
}

async fn handle_connection(stream: UnixStream) -> BridgeResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mut response = handle_line(&line);
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
    }

    Ok(())
}
