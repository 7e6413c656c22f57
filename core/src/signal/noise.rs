use crate::acoustics::Medium;
use crate::prelude::DetectorConfig;
use std::collections::VecDeque;

/// Noise means below this never shrink the blind-zone threshold further.
const NOISE_SANITY_FLOOR: f64 = 50.0;

/// Recent blind-zone indices averaged to stabilize the boundary.
const BLIND_ZONE_AVG_WINDOW: usize = 5;

/// Long-running noise state over per-frame floors.
///
/// The per-frame floor is the arithmetic mean of the tail samples; the
/// running mean and variance use Welford's update so no history is
/// re-summed, and an EMA mean tracks the floor for blind-zone scaling.
#[derive(Debug, Clone, Default)]
pub struct NoiseStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    ema_mean: f64,
}

impl NoiseStats {
    pub fn update(&mut self, floor: f64, ema_alpha: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean = floor;
            self.min = floor;
            self.max = floor;
            self.ema_mean = floor;
            return;
        }

        let delta = floor - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (floor - self.mean);
        self.min = self.min.min(floor);
        self.max = self.max.max(floor);
        self.ema_mean = ema_alpha * floor + (1.0 - ema_alpha) * self.ema_mean;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn ema_mean(&self) -> f64 {
        self.ema_mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Per-frame noise outputs consumed by the extractor and tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameNoise {
    pub floor: f64,
    pub dynamic_threshold: f64,
    pub blind_zone: usize,
}

/// Tracks the noise floor and the end of the transducer ring-down.
pub struct NoiseEstimator {
    config: DetectorConfig,
    ignore_first: usize,
    stats: NoiseStats,
    recent_blind_zones: VecDeque<usize>,
}

impl NoiseEstimator {
    pub fn new(config: DetectorConfig, medium: Medium) -> Self {
        let ignore_first = config
            .ignore_first_samples
            .unwrap_or_else(|| medium.ignore_first_samples());
        Self {
            config,
            ignore_first,
            stats: NoiseStats::default(),
            recent_blind_zones: VecDeque::with_capacity(BLIND_ZONE_AVG_WINDOW),
        }
    }

    pub fn stats(&self) -> &NoiseStats {
        &self.stats
    }

    /// Folds one frame into the running state and returns the floor, the
    /// dynamic detection threshold, and the smoothed blind-zone end.
    pub fn observe(&mut self, samples: &[u16]) -> FrameNoise {
        let floor = self.tail_mean(samples);
        self.stats.update(floor, self.config.noise_ema_alpha);

        let dynamic_threshold = self.dynamic_threshold();
        let blind_zone = self.smooth_blind_zone(self.scan_blind_zone(samples));

        FrameNoise {
            floor,
            dynamic_threshold,
            blind_zone,
        }
    }

    /// `mean + SNR · σ`, clamped so a cold or poisoned estimator can never
    /// gate below the static threshold.
    pub fn dynamic_threshold(&self) -> f64 {
        if self.stats.count() < 2 {
            return self.config.value_threshold;
        }
        let dynamic = self.stats.mean() + self.config.snr_factor * self.stats.variance().sqrt();
        if !dynamic.is_finite() {
            return self.config.value_threshold;
        }
        dynamic.max(self.config.value_threshold)
    }

    fn tail_mean(&self, samples: &[u16]) -> f64 {
        let range = self.config.noise_floor_range.clamp(1, samples.len());
        let tail = &samples[samples.len() - range..];
        let sum: u64 = tail.iter().map(|&v| v as u64).sum();
        sum as f64 / range as f64
    }

    /// First index past the ring-down where the envelope falls to the
    /// noise-scaled threshold, or the search limit.
    fn scan_blind_zone(&self, samples: &[u16]) -> usize {
        let limit = self.config.max_bz_search_samples.min(samples.len());
        let threshold =
            self.stats.ema_mean().max(NOISE_SANITY_FLOOR) * self.config.blind_zone_margin;

        for (index, &value) in samples.iter().enumerate().take(limit).skip(self.ignore_first) {
            if value as f64 <= threshold {
                return index;
            }
        }
        limit
    }

    fn smooth_blind_zone(&mut self, blind_zone: usize) -> usize {
        if self.recent_blind_zones.len() == BLIND_ZONE_AVG_WINDOW {
            self.recent_blind_zones.pop_front();
        }
        self.recent_blind_zones.push_back(blind_zone);
        let sum: usize = self.recent_blind_zones.iter().sum();
        sum / self.recent_blind_zones.len()
    }
}
