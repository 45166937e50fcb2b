//! Telemetry ingest adapter
//!
//! Accepts newline-delimited JSON telemetry records over TCP and feeds them
//! into the pipeline's sample channel. This is the transport seam: whatever
//! actually moves records off the broker (an MQTT bridge, a replay tool,
//! `nc` in a lab) connects here, and the core stays agnostic to it. The
//! adapter decodes records but leaves all validation to the pipeline's
//! ingestor; lines that are not even JSON are dropped and counted here.

use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use twin_lib::ingest::RawTelemetry;
use twin_lib::observability::AgentMetrics;

/// Listen for telemetry feeds until shutdown is signaled.
pub async fn serve(
    addr: &str,
    samples_tx: mpsc::Sender<RawTelemetry>,
    shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Telemetry ingest listening");
    accept_loop(listener, samples_tx, shutdown).await;
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    samples_tx: mpsc::Sender<RawTelemetry>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Telemetry feed connected");
                        tokio::spawn(read_feed(stream, peer, samples_tx.clone()));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept telemetry connection"),
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down telemetry ingest");
                break;
            }
        }
    }
}

/// Read one connection's lines until EOF or the pipeline goes away.
async fn read_feed(stream: TcpStream, peer: SocketAddr, samples_tx: mpsc::Sender<RawTelemetry>) {
    let metrics = AgentMetrics::new();
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawTelemetry>(&line) {
                    Ok(raw) => {
                        if samples_tx.send(raw).await.is_err() {
                            debug!(peer = %peer, "Pipeline closed, dropping feed");
                            return;
                        }
                    }
                    Err(e) => {
                        metrics.inc_malformed_samples();
                        debug!(peer = %peer, error = %e, "Dropping undecodable telemetry line");
                    }
                }
            }
            Ok(None) => {
                debug!(peer = %peer, "Telemetry feed disconnected");
                return;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Telemetry feed read error");
                return;
            }
        }
    }
}
