use anyhow::Context;
use echocore::acoustics::Medium;
use echocore::prelude::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub serial_path: String,
    pub baud_rate: u32,
    /// Transducer frequency in kHz; selects the acoustic medium.
    pub sonar_frequency: u32,
    pub http_port: u16,
    pub db_write_interval_ms: u64,
    /// Minimum peak amplitude forwarded on the binary channel.
    pub raw_emit_threshold: u16,
    /// Command line spawned to produce line-delimited gpsd JSON.
    pub gps_command: Vec<String>,
    pub detector: DetectorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            serial_path: "/dev/ttyUSB0".into(),
            baud_rate: 250_000,
            sonar_frequency: 200,
            http_port: 8080,
            db_write_interval_ms: 3000,
            raw_emit_threshold: 50,
            gps_command: vec!["gpspipe".into(), "-w".into()],
            detector: DetectorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading server config {}", path_ref.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing server config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn medium(&self) -> Medium {
        Medium::from_frequency_khz(self.sonar_frequency)
    }

    /// Database credentials come from the environment only; a missing
    /// value is a startup failure.
    pub fn database_url() -> anyhow::Result<String> {
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_select_water_acoustics() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.medium(), Medium::Water);
        assert_eq!(cfg.baud_rate, 250_000);
        assert_eq!(cfg.db_write_interval_ms, 3000);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"serial_path: /dev/ttyACM1\nsonar_frequency: 40\nhttp_port: 9001\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.serial_path, "/dev/ttyACM1");
        assert_eq!(cfg.medium(), Medium::Air);
        assert_eq!(cfg.http_port, 9001);
        // untouched keys keep their defaults
        assert_eq!(cfg.raw_emit_threshold, 50);
    }

    #[test]
    fn nested_detector_keys_are_optional() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"detector:\n  value_threshold: 80\n").unwrap();
        let path = temp.into_temp_path();
        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.detector.value_threshold, 80.0);
        assert_eq!(cfg.detector.consistency_samples, 10);
    }
}
