use serde::{Deserialize, Serialize};

/// Shared tuning for the per-frame detection stages.
///
/// `ignore_first_samples` is optional; when unset, the acoustic medium
/// supplies its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub value_threshold: f64,
    pub snr_factor: f64,
    pub n_max: usize,
    pub min_signal_separation: usize,
    pub consolidation_tolerance: usize,
    pub noise_floor_range: usize,
    pub max_bz_search_samples: usize,
    pub ignore_first_samples: Option<usize>,
    pub blind_zone_margin: f64,
    pub consistency_samples: u32,
    pub position_tolerance: f64,
    pub ema_alpha: f64,
    pub noise_ema_alpha: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            value_threshold: 60.0,
            snr_factor: 3.0,
            n_max: 7,
            min_signal_separation: 20,
            consolidation_tolerance: 5,
            noise_floor_range: 200,
            max_bz_search_samples: 400,
            ignore_first_samples: None,
            blind_zone_margin: 1.1,
            consistency_samples: 10,
            position_tolerance: 12.0,
            ema_alpha: 0.1,
            noise_ema_alpha: 0.1,
        }
    }
}

/// Common error type for the frame pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("checksum mismatch: computed {computed:#04x}, packet carries {found:#04x}")]
    ChecksumMismatch { computed: u8, found: u8 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
