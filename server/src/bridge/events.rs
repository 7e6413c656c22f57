use chrono::{DateTime, Utc};
use serde::Serialize;

/// Structured events pushed to telemetry subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Gps {
        lat: f64,
        lon: f64,
        alt: Option<f64>,
        speed: Option<f64>,
        track: Option<f64>,
        time: DateTime<Utc>,
        fix_mode: i32,
        accuracy: Option<f64>,
        status: String,
        depth_m: Option<f64>,
    },
    SonarBatch {
        readings: Vec<BatchReading>,
    },
    SatelliteUpdate {
        used: usize,
        total: usize,
    },
    RawCountUpdate,
}

/// One fused record as projected into a `sonar_batch` event.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReading {
    pub time: DateTime<Utc>,
    pub depth_cm: f64,
    pub lat: f64,
    pub lon: f64,
}

/// Compact high-rate record: distance in millimetres plus peak amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord([u8; 3]);

impl RawRecord {
    pub fn new(range_cm: f64, peak: u16) -> Self {
        let mm = (range_cm * 10.0).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        let amplitude = peak.min(u16::from(u8::MAX)) as u8;
        let [hi, lo] = mm.to_be_bytes();
        Self([hi, lo, amplitude])
    }

    pub fn to_bytes(self) -> [u8; 3] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_encodes_millimetres_big_endian() {
        let record = RawRecord::new(123.4, 200);
        assert_eq!(record.to_bytes(), [0x04, 0xD2, 200]); // 1234 mm
    }

    #[test]
    fn raw_record_clamps_both_fields() {
        let record = RawRecord::new(1.0e9, 65_535);
        assert_eq!(record.to_bytes(), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = TelemetryEvent::SatelliteUpdate { used: 7, total: 11 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "satellite_update");
        assert_eq!(json["used"], 7);

        let json = serde_json::to_value(&TelemetryEvent::RawCountUpdate).unwrap();
        assert_eq!(json["type"], "raw_count_update");
    }

    #[test]
    fn sonar_batch_serializes_its_readings() {
        let event = TelemetryEvent::SonarBatch {
            readings: vec![BatchReading {
                time: Utc::now(),
                depth_cm: 142.0,
                lat: 44.5,
                lon: 15.1,
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sonar_batch");
        assert_eq!(json["readings"][0]["depth_cm"], 142.0);
    }
}
