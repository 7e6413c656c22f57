use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use echocore::telemetry::PipelineMetrics;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;

mod bridge;
mod config;
mod db;
mod gps;
mod pipeline;
mod serial;

use bridge::{TelemetryBridge, TelemetryEvent};
use config::ServerConfig;
use db::{Db, GpsRawRow};
use pipeline::PipelineState;

#[derive(Parser)]
#[command(author, version, about = "Acoustic echo telemetry server")]
struct Args {
    /// Load a server config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    serial_path: Option<String>,
    #[arg(long)]
    baud_rate: Option<u32>,
    /// Transducer frequency in kHz (selects air or water acoustics)
    #[arg(long)]
    sonar_frequency: Option<u32>,
    #[arg(long)]
    http_port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(path) = args.serial_path {
        config.serial_path = path;
    }
    if let Some(baud) = args.baud_rate {
        config.baud_rate = baud;
    }
    if let Some(khz) = args.sonar_frequency {
        config.sonar_frequency = khz;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    let database_url = ServerConfig::database_url()?;

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating pipeline runtime")?;
    runtime.block_on(run(config, database_url))
}

async fn run(config: ServerConfig, database_url: String) -> anyhow::Result<()> {
    let metrics = Arc::new(PipelineMetrics::new());
    let db = Db::connect(&database_url, metrics.clone()).await?;

    let bridge = TelemetryBridge::new();
    bridge.serve(config.http_port);

    let port = serial::open(&config.serial_path, config.baud_rate)?;
    info!(
        "sonar link open on {} at {} baud ({:?})",
        config.serial_path,
        config.baud_rate,
        config.medium()
    );

    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    let (gps_tx, mut gps_rx) = mpsc::channel(64);
    tokio::spawn(serial::run(
        port,
        config.serial_path.clone(),
        config.baud_rate,
        frame_tx,
        metrics.clone(),
    ));
    tokio::spawn(gps::link::run(config.gps_command.clone(), gps_tx));

    let mut state = PipelineState::new(&config);
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_frame = frame_rx.recv() => {
                let Some(frame) = maybe_frame else {
                    anyhow::bail!("serial reader terminated unexpectedly");
                };
                let outcome = state.ingest_frame(&frame, Instant::now());
                metrics.record_frame(outcome.detection_count as u64);
                if !outcome.raw_records.is_empty() {
                    metrics.record_raw_records(outcome.raw_records.len() as u64);
                    for record in outcome.raw_records {
                        bridge.publish_raw(record);
                    }
                }
                if let Some(row) = outcome.reading {
                    db.insert_reading(&row).await;
                }
            }
            maybe_line = gps_rx.recv() => {
                let Some(line) = maybe_line else {
                    anyhow::bail!("gps supervisor terminated unexpectedly");
                };
                handle_gps_line(&line, &mut state, &db, &bridge, &metrics).await;
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                let snapshot = metrics.snapshot();
                info!(
                    "processed {} frames, {} checksum failures, {} db rows",
                    snapshot.frames, snapshot.checksum_failures, snapshot.db_rows
                );
                return Ok(());
            }
        }
    }
}

async fn handle_gps_line(
    line: &str,
    state: &mut PipelineState,
    db: &Db,
    bridge: &TelemetryBridge,
    metrics: &PipelineMetrics,
) {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            metrics.record_gps_parse_failure();
            debug!("ignoring non-json gps line: {}", err);
            return;
        }
    };

    db.insert_gps_raw(&GpsRawRow {
        timestamp: Utc::now(),
        message: value,
    })
    .await;
    bridge.publish_event(&TelemetryEvent::RawCountUpdate);

    let Some(message) = gps::parser::parse_line(line) else {
        metrics.record_gps_parse_failure();
        return;
    };

    let outcome = state.ingest_gps(&message);
    if let Some(point) = &outcome.point {
        metrics.record_gps_fix();
        // The point lands before the emits that clear the fusion buffer.
        db.insert_gps_point(point).await;
    }
    if let Some(fix) = &outcome.fix {
        bridge.publish_fix(fix);
    }
    for event in &outcome.events {
        bridge.publish_event(event);
    }
}
