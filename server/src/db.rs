use anyhow::Context;
use chrono::{DateTime, Utc};
use echocore::telemetry::PipelineMetrics;
use log::warn;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;

/// Throttled representative sample of the echo stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SonarReadingRow {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub max_value: i32,
    pub max_sample_index: i32,
    pub max_distance_cm: f64,
}

/// One accepted fix.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsPointRow {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub track: Option<f64>,
    pub accuracy: Option<f64>,
    pub fix_mode: i32,
}

/// One raw gpsd line, stored as jsonb.
#[derive(Debug, Clone)]
pub struct GpsRawRow {
    pub timestamp: DateTime<Utc>,
    pub message: serde_json::Value,
}

/// Thin insert-only store. Every insert failure is logged and the row
/// dropped; the pipeline never retries or queues.
pub struct Db {
    pool: PgPool,
    metrics: Arc<PipelineMetrics>,
}

impl Db {
    pub async fn connect(url: &str, metrics: Arc<PipelineMetrics>) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .context("connecting to the telemetry database")?;
        Ok(Self { pool, metrics })
    }

    pub async fn insert_reading(&self, row: &SonarReadingRow) {
        let result = sqlx::query(
            "INSERT INTO sonar_readings \
             (timestamp, latitude, longitude, max_value, max_sample_index, max_distance_cm) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.timestamp)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(row.max_value)
        .bind(row.max_sample_index)
        .bind(row.max_distance_cm)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.metrics.record_db_row(),
            Err(err) => {
                self.metrics.record_db_failure();
                warn!("dropping sonar reading: {}", err);
            }
        }
    }

    pub async fn insert_gps_point(&self, row: &GpsPointRow) {
        let result = sqlx::query(
            "INSERT INTO gps_points \
             (timestamp, lat, lon, speed, track, accuracy, fix_mode) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.timestamp)
        .bind(row.lat)
        .bind(row.lon)
        .bind(row.speed)
        .bind(row.track)
        .bind(row.accuracy)
        .bind(row.fix_mode)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            self.metrics.record_db_failure();
            warn!("dropping gps point: {}", err);
        }
    }

    pub async fn insert_gps_raw(&self, row: &GpsRawRow) {
        let result = sqlx::query("INSERT INTO gps_raw (timestamp, message) VALUES ($1, $2)")
            .bind(row.timestamp)
            .bind(Json(row.message.clone()))
            .execute(&self.pool)
            .await;

        if let Err(err) = result {
            self.metrics.record_db_failure();
            warn!("dropping raw gps message: {}", err);
        }
    }
}
