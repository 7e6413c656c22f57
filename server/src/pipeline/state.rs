use crate::bridge::events::{BatchReading, RawRecord, TelemetryEvent};
use crate::config::ServerConfig;
use crate::db::{GpsPointRow, SonarReadingRow};
use crate::gps::{GpsFix, GpsMessage, TpvReport};
use crate::pipeline::fusion::{FusedRecord, FusionBuffer};
use echocore::acoustics::Medium;
use echocore::framing::Frame;
use echocore::signal::{DepthSmoother, NoiseEstimator, SignalExtractor};
use echocore::telemetry::LogManager;
use echocore::tracking::Tracker;
use std::time::{Duration, Instant};

/// What one frame asks the supervisor to do after the transform.
pub struct FrameOutcome {
    pub raw_records: Vec<RawRecord>,
    pub reading: Option<SonarReadingRow>,
    pub detection_count: usize,
}

/// What one GPS message asks the supervisor to do.
pub struct GpsOutcome {
    pub point: Option<GpsPointRow>,
    pub fix: Option<GpsFix>,
    pub events: Vec<TelemetryEvent>,
}

impl GpsOutcome {
    fn empty() -> Self {
        Self {
            point: None,
            fix: None,
            events: Vec::new(),
        }
    }
}

/// All mutable pipeline state, owned by the supervisor task and passed
/// explicitly to each stage.
///
/// `ingest_frame` and `ingest_gps` are pure synchronous transforms; the
/// returned outcomes tell the caller which rows to insert and which
/// events to emit, keeping every await outside the per-frame path.
pub struct PipelineState {
    medium: Medium,
    noise: NoiseEstimator,
    extractor: SignalExtractor,
    tracker: Tracker,
    smoother: DepthSmoother,
    fusion: FusionBuffer,
    last_fix: Option<GpsFix>,
    last_db_write: Option<Instant>,
    db_write_interval: Duration,
    raw_emit_threshold: u16,
    logger: LogManager,
}

impl PipelineState {
    pub fn new(config: &ServerConfig) -> Self {
        let medium = config.medium();
        Self {
            medium,
            noise: NoiseEstimator::new(config.detector.clone(), medium),
            extractor: SignalExtractor::new(config.detector.clone(), medium),
            tracker: Tracker::new(config.detector.clone()),
            smoother: DepthSmoother::new(config.detector.ema_alpha),
            fusion: FusionBuffer::new(),
            last_fix: None,
            last_db_write: None,
            db_write_interval: Duration::from_millis(config.db_write_interval_ms),
            raw_emit_threshold: config.raw_emit_threshold,
            logger: LogManager::new(),
        }
    }

    /// One atomic transform per validated frame.
    pub fn ingest_frame(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        let noise = self.noise.observe(&frame.samples);
        let detections =
            self.extractor
                .extract(&frame.samples, noise.blind_zone, noise.dynamic_threshold);
        self.tracker
            .step(&detections, self.noise.stats().variance(), frame.seq);

        let primary_cm = self
            .tracker
            .primary(noise.blind_zone)
            .map(|track| self.medium.range_cm(track.median_index()))
            .unwrap_or(0.0);
        let depth_cm = self.smoother.update(primary_cm).unwrap_or(0.0);

        let strongest = detections.iter().max_by_key(|d| d.peak);
        self.fusion.push(FusedRecord {
            timestamp: frame.timestamp,
            depth_cm,
            peak: strongest.map(|d| d.peak).unwrap_or(0),
            peak_index: strongest.map(|d| d.peak_index).unwrap_or(0),
            gps: self.last_fix.clone(),
        });

        let raw_records = detections
            .iter()
            .filter(|d| d.peak > self.raw_emit_threshold)
            .map(|d| RawRecord::new(d.range_cm, d.peak))
            .collect();

        FrameOutcome {
            raw_records,
            reading: self.throttled_reading(now),
            detection_count: detections.len(),
        }
    }

    /// One representative row per interval, and only while a fix is known.
    /// The buffer itself is left for the next GPS-gated emit.
    fn throttled_reading(&mut self, now: Instant) -> Option<SonarReadingRow> {
        let due = match self.last_db_write {
            None => true,
            Some(last) => now.duration_since(last) >= self.db_write_interval,
        };
        if !due {
            return None;
        }
        let latest = self.fusion.latest()?;
        let fix = latest.gps.as_ref()?;
        let row = SonarReadingRow {
            timestamp: latest.timestamp,
            latitude: fix.lat,
            longitude: fix.lon,
            max_value: latest.peak as i32,
            max_sample_index: latest.peak_index as i32,
            max_distance_cm: latest.depth_cm,
        };
        self.last_db_write = Some(now);
        Some(row)
    }

    pub fn ingest_gps(&mut self, message: &GpsMessage) -> GpsOutcome {
        match message {
            GpsMessage::Tpv(tpv) => self.ingest_tpv(tpv),
            GpsMessage::Sky(sky) => GpsOutcome {
                point: None,
                fix: None,
                events: vec![TelemetryEvent::SatelliteUpdate {
                    used: sky.used_count(),
                    total: sky.total_count(),
                }],
            },
            GpsMessage::Other => GpsOutcome::empty(),
        }
    }

    fn ingest_tpv(&mut self, tpv: &TpvReport) -> GpsOutcome {
        let fix = match tpv.to_fix() {
            Some(fix) => fix,
            None => return GpsOutcome::empty(),
        };
        self.last_fix = Some(fix.clone());

        let mut events = Vec::new();
        if !self.fusion.is_empty() {
            self.logger.record(&format!(
                "gps fix accepted, emitting {} buffered readings ({} dropped lifetime)",
                self.fusion.len(),
                self.fusion.dropped()
            ));
            let drained = self.fusion.drain();
            let readings = drained
                .into_iter()
                .map(|record| {
                    let (lat, lon) = record
                        .gps
                        .as_ref()
                        .map(|g| (g.lat, g.lon))
                        .unwrap_or((fix.lat, fix.lon));
                    BatchReading {
                        time: record.timestamp,
                        depth_cm: record.depth_cm,
                        lat,
                        lon,
                    }
                })
                .collect();
            events.push(TelemetryEvent::SonarBatch { readings });
        }

        events.push(TelemetryEvent::Gps {
            lat: fix.lat,
            lon: fix.lon,
            alt: fix.alt,
            speed: fix.speed,
            track: fix.track,
            time: fix.time,
            fix_mode: fix.mode,
            accuracy: fix.accuracy,
            status: fix.status().to_string(),
            depth_m: self.smoother.current_cm().map(|cm| cm / 100.0),
        });

        GpsOutcome {
            point: Some(GpsPointRow {
                timestamp: fix.time,
                lat: fix.lat,
                lon: fix.lon,
                speed: fix.speed,
                track: fix.track,
                accuracy: fix.accuracy,
                fix_mode: fix.mode,
            }),
            fix: Some(fix),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use echocore::acoustics::FRAME_SAMPLES;
    use echocore::framing::METADATA_LEN;

    fn frame(seq: u64) -> Frame {
        let mut samples = vec![0u16; FRAME_SAMPLES];
        for sample in samples.iter_mut().take(411).skip(400) {
            *sample = 200;
        }
        Frame {
            seq,
            timestamp: Utc::now(),
            metadata: [0; METADATA_LEN],
            samples,
        }
    }

    fn tpv(mode: i32, lat: f64, lon: f64) -> GpsMessage {
        GpsMessage::Tpv(TpvReport {
            mode,
            lat: Some(lat),
            lon: Some(lon),
            ..TpvReport::default()
        })
    }

    #[test]
    fn frames_without_gps_buffer_but_never_persist() {
        let mut state = PipelineState::new(&ServerConfig::default());
        let start = Instant::now();

        let mut raw_total = 0;
        for seq in 0..50 {
            let now = start + Duration::from_millis(seq * 40);
            let outcome = state.ingest_frame(&frame(seq), now);
            assert!(outcome.reading.is_none());
            raw_total += outcome.raw_records.len();
        }
        assert_eq!(raw_total, 50);

        // The gating fix flushes all fifty records in one batch, then
        // reports the fix itself with the smoothed depth.
        let outcome = state.ingest_gps(&tpv(3, 44.5, 15.1));
        assert!(outcome.point.is_some());
        assert_eq!(outcome.events.len(), 2);
        match &outcome.events[0] {
            TelemetryEvent::SonarBatch { readings } => {
                assert_eq!(readings.len(), 50);
                assert_eq!(readings[0].lat, 44.5);
            }
            other => panic!("expected sonar_batch first, got {:?}", other),
        }
        match &outcome.events[1] {
            TelemetryEvent::Gps { depth_m, lat, .. } => {
                assert_eq!(*lat, 44.5);
                let expected_m = Medium::Water.range_cm(405) / 100.0;
                assert!((depth_m.unwrap() - expected_m).abs() < 1e-9);
            }
            other => panic!("expected gps event second, got {:?}", other),
        }

        // The buffer emptied: a second fix produces no batch.
        let outcome = state.ingest_gps(&tpv(3, 44.6, 15.2));
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], TelemetryEvent::Gps { .. }));
    }

    #[test]
    fn db_writes_are_throttled_to_the_interval() {
        let mut state = PipelineState::new(&ServerConfig::default());
        state.ingest_gps(&tpv(3, 44.5, 15.1));

        let start = Instant::now();
        let mut rows = Vec::new();
        for seq in 0..100 {
            let now = start + Duration::from_millis(seq * 50);
            if let Some(row) = state.ingest_frame(&frame(seq), now).reading {
                rows.push(row);
            }
        }
        // 100 frames over five seconds, one row per three: ceil(5/3)
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].latitude, 44.5);
        assert_eq!(rows[0].max_value, 200);
    }

    #[test]
    fn low_grade_fixes_are_ignored() {
        let mut state = PipelineState::new(&ServerConfig::default());
        let outcome = state.ingest_gps(&tpv(1, 44.5, 15.1));
        assert!(outcome.point.is_none());
        assert!(outcome.events.is_empty());

        // still no snapshot, so the throttle stays closed
        let outcome = state.ingest_frame(&frame(0), Instant::now());
        assert!(outcome.reading.is_none());
    }

    #[test]
    fn sky_reports_become_satellite_updates() {
        let mut state = PipelineState::new(&ServerConfig::default());
        let message = crate::gps::parser::parse_line(
            r#"{"class":"SKY","satellites":[{"used":true},{"used":false}]}"#,
        )
        .unwrap();
        let outcome = state.ingest_gps(&message);
        assert!(matches!(
            outcome.events[0],
            TelemetryEvent::SatelliteUpdate { used: 1, total: 2 }
        ));
    }

    #[test]
    fn quiet_frames_emit_nothing_on_the_raw_channel() {
        let mut state = PipelineState::new(&ServerConfig::default());
        let quiet = Frame {
            seq: 0,
            timestamp: Utc::now(),
            metadata: [0; METADATA_LEN],
            samples: vec![0u16; FRAME_SAMPLES],
        };
        let outcome = state.ingest_frame(&quiet, Instant::now());
        assert!(outcome.raw_records.is_empty());
        assert_eq!(outcome.detection_count, 0);
    }
}
