use anyhow::Context;
use echocore::framing::{Frame, Reassembler};
use echocore::telemetry::PipelineMetrics;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

const REOPEN_DELAY: Duration = Duration::from_secs(2);
const READ_CHUNK: usize = 4096;

/// Opens the sonar link (250k 8-N-1 by default). The first open is the
/// caller's to fail on; later errors are handled by [`run`].
pub fn open(path: &str, baud_rate: u32) -> anyhow::Result<SerialStream> {
    tokio_serial::new(path, baud_rate)
        .open_native_async()
        .with_context(|| format!("opening sonar serial port {}", path))
}

/// Reads the port forever, pushing reassembled frames into the channel.
///
/// Read errors and closes tear the port down and reopen it after a
/// bounded delay; the process never exits from here. Returns only when
/// the frame consumer goes away.
pub async fn run(
    mut port: SerialStream,
    path: String,
    baud_rate: u32,
    tx: mpsc::Sender<Frame>,
    metrics: Arc<PipelineMetrics>,
) {
    let mut reassembler = Reassembler::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut reported = reassembler.stats();

    loop {
        match port.read(&mut chunk).await {
            Ok(0) => {
                warn!("serial port {} closed", path);
                port = reopen(&path, baud_rate).await;
            }
            Ok(n) => {
                for frame in reassembler.extend(&chunk[..n]) {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
                let stats = reassembler.stats();
                metrics.record_resync(
                    stats.checksum_failures - reported.checksum_failures,
                    stats.bytes_discarded - reported.bytes_discarded,
                );
                reported = stats;
            }
            Err(err) => {
                warn!("serial port {} error: {}", path, err);
                port = reopen(&path, baud_rate).await;
            }
        }
    }
}

async fn reopen(path: &str, baud_rate: u32) -> SerialStream {
    loop {
        tokio::time::sleep(REOPEN_DELAY).await;
        match tokio_serial::new(path, baud_rate).open_native_async() {
            Ok(port) => {
                info!("serial port {} reopened", path);
                return port;
            }
            Err(err) => warn!("serial port {} reopen failed: {}", path, err),
        }
    }
}
