use crate::bridge::events::{RawRecord, TelemetryEvent};
use crate::gps::GpsFix;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use tokio::sync::broadcast;
use warp::ws::{Message, WebSocket};
use warp::Filter;

/// Pending messages per channel; laggards drop, they are never waited on.
const CHANNEL_CAPACITY: usize = 32;

/// Fan-out hub for the two socket channels and the latest-fix snapshot.
///
/// Publishing never blocks: with no subscriber the message is discarded,
/// and a slow subscriber loses messages rather than stalling the
/// pipeline. A failed socket send prunes that subscriber.
pub struct TelemetryBridge {
    telemetry_tx: broadcast::Sender<String>,
    raw_tx: broadcast::Sender<[u8; 3]>,
    last_fix: Arc<RwLock<Option<GpsFix>>>,
}

impl TelemetryBridge {
    pub fn new() -> Self {
        let (telemetry_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (raw_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            telemetry_tx,
            raw_tx,
            last_fix: Arc::new(RwLock::new(None)),
        }
    }

    /// Starts the HTTP endpoint on its own thread and runtime.
    pub fn serve(&self, port: u16) {
        let telemetry_tx = self.telemetry_tx.clone();
        let raw_tx = self.raw_tx.clone();
        let last_fix = self.last_fix.clone();
        let address = SocketAddr::from(([0, 0, 0, 0], port));

        thread::spawn(move || {
            let telemetry_filter = warp::any().map(move || telemetry_tx.clone());
            let raw_filter = warp::any().map(move || raw_tx.clone());
            let fix_filter = warp::any().map(move || last_fix.clone());

            let telemetry_route = warp::path("telemetry")
                .and(warp::ws())
                .and(telemetry_filter)
                .map(|ws: warp::ws::Ws, tx: broadcast::Sender<String>| {
                    ws.on_upgrade(move |socket| forward_telemetry(socket, tx.subscribe()))
                });

            let raw_route = warp::path("raw")
                .and(warp::ws())
                .and(raw_filter)
                .map(|ws: warp::ws::Ws, tx: broadcast::Sender<[u8; 3]>| {
                    ws.on_upgrade(move |socket| forward_raw(socket, tx.subscribe()))
                });

            let fix_route = warp::path("gps")
                .and(warp::get())
                .and(fix_filter)
                .map(|fix: Arc<RwLock<Option<GpsFix>>>| {
                    let snapshot = fix.read().ok().and_then(|guard| guard.clone());
                    warp::reply::json(&snapshot)
                });

            let routes = telemetry_route.or(raw_route).or(fix_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        });
    }

    pub fn publish_event(&self, event: &TelemetryEvent) {
        if self.telemetry_tx.receiver_count() == 0 {
            return;
        }
        match serde_json::to_string(event) {
            Ok(json) => {
                let _ = self.telemetry_tx.send(json);
            }
            Err(err) => warn!("failed to serialize telemetry event: {}", err),
        }
    }

    pub fn publish_raw(&self, record: RawRecord) {
        if self.raw_tx.receiver_count() == 0 {
            return;
        }
        let _ = self.raw_tx.send(record.to_bytes());
    }

    pub fn publish_fix(&self, fix: &GpsFix) {
        if let Ok(mut guard) = self.last_fix.write() {
            *guard = Some(fix.clone());
        }
    }

    #[cfg(test)]
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<String> {
        self.telemetry_tx.subscribe()
    }

    #[cfg(test)]
    pub fn subscribe_raw(&self) -> broadcast::Receiver<[u8; 3]> {
        self.raw_tx.subscribe()
    }
}

impl Default for TelemetryBridge {
    fn default() -> Self {
        Self::new()
    }
}

async fn forward_telemetry(socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    let (mut sink, _) = socket.split();
    loop {
        match rx.recv().await {
            Ok(json) => {
                if sink.send(Message::text(json)).await.is_err() {
                    debug!("telemetry subscriber went away");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("telemetry subscriber lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn forward_raw(socket: WebSocket, mut rx: broadcast::Receiver<[u8; 3]>) {
    let (mut sink, _) = socket.split();
    loop {
        match rx.recv().await {
            Ok(bytes) => {
                if sink.send(Message::binary(bytes.to_vec())).await.is_err() {
                    debug!("raw subscriber went away");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("raw subscriber lagged, {} records dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
