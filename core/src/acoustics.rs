use serde::{Deserialize, Serialize};

/// Samples per validated frame.
pub const FRAME_SAMPLES: usize = 1800;

/// ADC sample period in seconds.
pub const SAMPLE_TIME_S: f64 = 13.2e-6;

/// Acoustic medium, selected at startup from the transducer frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Air,
    Water,
}

impl Medium {
    /// 40 kHz transducers run in air, 200 kHz in water.
    pub fn from_frequency_khz(khz: u32) -> Self {
        if khz >= 100 {
            Medium::Water
        } else {
            Medium::Air
        }
    }

    pub fn speed_of_sound_m_s(self) -> f64 {
        match self {
            Medium::Air => 330.0,
            Medium::Water => 1522.0,
        }
    }

    /// Leading samples swamped by the transmit burst itself.
    pub fn ignore_first_samples(self) -> usize {
        match self {
            Medium::Air => 2,
            Medium::Water => 8,
        }
    }

    /// Two-way range covered by one sample, in centimetres.
    pub fn cm_per_sample(self) -> f64 {
        self.speed_of_sound_m_s() * SAMPLE_TIME_S / 2.0 * 100.0
    }

    pub fn range_cm(self, sample_index: usize) -> f64 {
        sample_index as f64 * self.cm_per_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_selects_medium() {
        assert_eq!(Medium::from_frequency_khz(40), Medium::Air);
        assert_eq!(Medium::from_frequency_khz(200), Medium::Water);
    }

    #[test]
    fn air_resolution_is_just_under_a_quarter_centimetre() {
        let r = Medium::Air.cm_per_sample();
        assert!((r - 0.2178).abs() < 1e-4);
    }

    #[test]
    fn water_range_spans_roughly_eighteen_metres() {
        let full = Medium::Water.range_cm(FRAME_SAMPLES);
        assert!(full > 1700.0 && full < 1900.0);
    }
}
