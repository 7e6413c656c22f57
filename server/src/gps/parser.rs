use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// One gpsd message, discriminated by its `class` field. Everything that
/// is not a position or sky report is carried as `Other` and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "class")]
pub enum GpsMessage {
    #[serde(rename = "TPV")]
    Tpv(TpvReport),
    #[serde(rename = "SKY")]
    Sky(SkyReport),
    #[serde(other)]
    Other,
}

/// Time-position-velocity report. All fields are optional on the wire;
/// a usable fix requires `mode >= 2` plus both coordinates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TpvReport {
    #[serde(default)]
    pub mode: i32,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub speed: Option<f64>,
    pub track: Option<f64>,
    pub epx: Option<f64>,
    pub epy: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl TpvReport {
    /// Horizontal accuracy from the per-axis error estimates.
    pub fn accuracy(&self) -> Option<f64> {
        match (self.epx, self.epy) {
            (Some(epx), Some(epy)) => Some((epx * epx + epy * epy).sqrt()),
            _ => None,
        }
    }

    pub fn to_fix(&self) -> Option<GpsFix> {
        if self.mode < 2 {
            return None;
        }
        let lat = self.lat?;
        let lon = self.lon?;
        Some(GpsFix {
            lat,
            lon,
            alt: self.alt,
            speed: self.speed,
            track: self.track,
            mode: self.mode,
            accuracy: self.accuracy(),
            time: self.time.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkyReport {
    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Satellite {
    #[serde(default)]
    pub used: bool,
}

impl SkyReport {
    pub fn used_count(&self) -> usize {
        self.satellites.iter().filter(|s| s.used).count()
    }

    pub fn total_count(&self) -> usize {
        self.satellites.len()
    }
}

/// Immutable snapshot of an accepted fix; fused records copy it by value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    pub speed: Option<f64>,
    pub track: Option<f64>,
    pub mode: i32,
    pub accuracy: Option<f64>,
    pub time: DateTime<Utc>,
}

impl GpsFix {
    pub fn status(&self) -> &'static str {
        match self.mode {
            3 => "3D",
            2 => "2D",
            _ => "NO FIX",
        }
    }
}

/// Parses one line of gpsd JSON; malformed lines are dropped.
pub fn parse_line(line: &str) -> Option<GpsMessage> {
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!("ignoring unparsable gps line: {}", err);
            None
        }
    }
}
