use std::collections::VecDeque;

/// A reflecting object holding a persistent identity across frames.
///
/// State is a 1-D constant-position Kalman filter over the sample index,
/// with a bounded persistence counter and a short index history for
/// outlier-resistant median estimates.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u64,
    /// Filtered sample index.
    pub position: f64,
    /// Estimate uncertainty (P).
    pub covariance: f64,
    pub amplitude: u16,
    pub persistence: u32,
    pub misses: u32,
    pub last_seen: u64,
    history: VecDeque<usize>,
    history_cap: usize,
}

impl Track {
    pub(crate) fn new(
        id: u64,
        index: usize,
        amplitude: u16,
        seq: u64,
        initial_covariance: f64,
        history_cap: usize,
    ) -> Self {
        let mut history = VecDeque::with_capacity(history_cap);
        history.push_back(index);
        Self {
            id,
            position: index as f64,
            covariance: initial_covariance,
            amplitude,
            persistence: 1,
            misses: 0,
            last_seen: seq,
            history,
            history_cap,
        }
    }

    pub(crate) fn predict(&mut self, process_noise: f64) {
        self.covariance += process_noise;
    }

    pub(crate) fn observe(
        &mut self,
        index: usize,
        amplitude: u16,
        measurement_noise: f64,
        seq: u64,
        persistence_cap: u32,
    ) {
        let gain = self.covariance / (self.covariance + measurement_noise);
        self.position += gain * (index as f64 - self.position);
        self.covariance *= 1.0 - gain;
        self.amplitude = amplitude;
        self.persistence = (self.persistence + 1).min(persistence_cap);
        self.misses = 0;
        self.last_seen = seq;
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(index);
    }

    /// Unmatched this frame: carry the prediction and decay. Tracks at or
    /// above the persistence threshold decay twice as fast, so a stale
    /// lock cannot linger once the target is gone.
    pub(crate) fn miss(&mut self, persistence_threshold: u32) {
        self.misses += 1;
        let decay = if self.persistence >= persistence_threshold {
            2
        } else {
            1
        };
        self.persistence = self.persistence.saturating_sub(decay);
    }

    pub fn is_persistent(&self, persistence_threshold: u32) -> bool {
        self.persistence >= persistence_threshold
    }

    /// Median of the recent observed indices.
    pub fn median_index(&self) -> usize {
        let mut sorted: Vec<usize> = self.history.iter().copied().collect();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2
        } else {
            sorted[mid]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_at(index: usize) -> Track {
        Track::new(0, index, 100, 0, 25.0, 20)
    }

    #[test]
    fn kalman_update_moves_towards_the_measurement() {
        let mut track = track_at(700);
        track.observe(710, 100, 4.0, 1, 12);
        assert!(track.position > 700.0 && track.position < 710.0);
        assert!(track.covariance < 25.0);
    }

    #[test]
    fn median_resists_single_frame_outliers() {
        let mut track = track_at(700);
        for index in [700, 700, 701, 1500] {
            track.observe(index, 100, 4.0, 1, 12);
        }
        assert_eq!(track.median_index(), 700);
    }

    #[test]
    fn persistent_tracks_decay_twice_as_fast() {
        let mut track = track_at(500);
        track.persistence = 12;
        track.miss(10);
        assert_eq!(track.persistence, 10);
        track.miss(10);
        assert_eq!(track.persistence, 8);
        track.miss(10);
        assert_eq!(track.persistence, 7);
    }

    #[test]
    fn persistence_saturates_at_zero() {
        let mut track = track_at(500);
        track.miss(10);
        track.miss(10);
        assert_eq!(track.persistence, 0);
    }
}
