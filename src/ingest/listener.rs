//! Telemetry feed listener.
//!
//! Accepts TCP connections from the field gateway and reads one JSON frame
//! per line. Each line goes straight into the router's bounded queue;
//! nothing here touches the disk, so a slow writer never backs up into the
//! socket accept loop.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::ingest::IngestHandle;

/// Accept loop. Runs until the surrounding task is dropped.
pub async fn run_listener(listener: TcpListener, handle: IngestHandle) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Telemetry listener ready");
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "Telemetry connection accepted");
                let handle = handle.clone();
                tokio::spawn(async move {
                    serve_connection(stream, handle).await;
                    tracing::info!(%peer, "Telemetry connection closed");
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept telemetry connection");
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, handle: IngestHandle) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    handle.submit(line.into_bytes());
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry connection read failed");
                break;
            }
        }
    }
}
