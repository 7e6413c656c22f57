use crate::acoustics::Medium;
use crate::prelude::DetectorConfig;

/// One acoustic return in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// First sample at or above the detection threshold.
    pub start: usize,
    /// First sample past the pulse (exclusive).
    pub end: usize,
    /// Centre of the first maximal plateau within the pulse.
    pub peak_index: usize,
    pub peak: u16,
    /// Samples at or above the threshold within the pulse.
    pub width: usize,
    /// Two-way range of the pulse leading edge.
    pub range_cm: f64,
}

/// Extracts separated, width-characterized pulses from one envelope.
pub struct SignalExtractor {
    config: DetectorConfig,
    medium: Medium,
}

impl SignalExtractor {
    pub fn new(config: DetectorConfig, medium: Medium) -> Self {
        Self { config, medium }
    }

    /// Scans `[blind_zone, len)` and returns up to `n_max` detections in
    /// ascending index order.
    ///
    /// A pulse starting within `consolidation_tolerance` of the previous
    /// pulse's end collapses into it, the dominant peak winning amplitude
    /// and index; a pulse starting closer than `min_signal_separation`
    /// without qualifying for consolidation is dropped.
    pub fn extract(
        &self,
        samples: &[u16],
        blind_zone: usize,
        dynamic_threshold: f64,
    ) -> Vec<Detection> {
        let mut detections: Vec<Detection> = Vec::new();
        let mut i = blind_zone;

        while i < samples.len() {
            if (samples[i] as f64) < dynamic_threshold {
                i += 1;
                continue;
            }

            let start = i;
            let mut end = i;
            while end < samples.len() && samples[end] as f64 >= dynamic_threshold {
                end += 1;
            }
            let (peak, peak_index) = Self::dominant_peak(samples, start, end);
            let width = end - start;
            let gap = detections.last().map(|prev| start - prev.end);

            match gap {
                Some(gap)
                    if self.config.consolidation_tolerance > 0
                        && gap <= self.config.consolidation_tolerance =>
                {
                    if let Some(prev) = detections.last_mut() {
                        if peak > prev.peak {
                            prev.peak = peak;
                            prev.peak_index = peak_index;
                        }
                        prev.end = end;
                        prev.width += width;
                    }
                }
                Some(gap) if gap < self.config.min_signal_separation => {
                    // Too close to merge, too close to keep.
                }
                _ => {
                    if detections.len() == self.config.n_max {
                        break;
                    }
                    detections.push(Detection {
                        start,
                        end,
                        peak_index,
                        peak,
                        width,
                        range_cm: self.medium.range_cm(start),
                    });
                }
            }

            i = end + 1;
        }

        detections
    }

    fn dominant_peak(samples: &[u16], start: usize, end: usize) -> (u16, usize) {
        let mut peak = samples[start];
        let mut plateau_start = start;
        for (index, &value) in samples.iter().enumerate().take(end).skip(start) {
            if value > peak {
                peak = value;
                plateau_start = index;
            }
        }
        let mut plateau_end = plateau_start;
        while plateau_end + 1 < end && samples[plateau_end + 1] == peak {
            plateau_end += 1;
        }
        (peak, (plateau_start + plateau_end) / 2)
    }
}
