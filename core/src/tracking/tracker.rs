use crate::prelude::DetectorConfig;
use crate::signal::Detection;
use crate::tracking::Track;
use std::cmp::Ordering;

/// Constant-position process noise added to every track per frame.
const PROCESS_NOISE: f64 = 2.0;

/// Covariance assigned to a freshly created track.
const INITIAL_COVARIANCE: f64 = 25.0;

/// Persistence may climb this far past the threshold.
const PERSISTENCE_HEADROOM: u32 = 2;

/// A track missing this many consecutive frames is destroyed outright.
const MISS_BOUND: u32 = 5;

/// Maximum widening of the association window for strong echoes.
const MAX_TOLERANCE_BOOST: f64 = 8.0;

/// Amplitude at which the association boost saturates.
const AMPLITUDE_BOOST_REF: f64 = 500.0;

/// Associates per-frame detections with persistent tracks.
///
/// Each track is a 1-D Kalman filter; unmatched detections open new tracks
/// up to `n_max`, unmatched tracks carry their prediction and decay.
pub struct Tracker {
    config: DetectorConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Tracker {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn persistent_tracks(&self) -> impl Iterator<Item = &Track> {
        let threshold = self.config.consistency_samples;
        self.tracks.iter().filter(move |t| t.is_persistent(threshold))
    }

    /// The closest persistent track at or past the blind zone.
    pub fn primary(&self, blind_zone: usize) -> Option<&Track> {
        self.persistent_tracks()
            .filter(|t| t.median_index() >= blind_zone)
            .min_by_key(|t| t.median_index())
    }

    /// Advances every track by one frame.
    ///
    /// Measurement noise scales with the running envelope noise variance,
    /// so a hissy background loosens the filter rather than whipping it.
    pub fn step(&mut self, detections: &[Detection], noise_variance: f64, seq: u64) {
        for track in &mut self.tracks {
            track.predict(PROCESS_NOISE);
        }

        let measurement_noise = noise_variance.max(1.0);
        let persistence_cap = self.config.consistency_samples + PERSISTENCE_HEADROOM;
        let mut claimed = vec![false; self.tracks.len()];
        let mut unmatched: Vec<&Detection> = Vec::new();

        for detection in detections {
            let window = self.association_window(detection.peak);
            let z = detection.peak_index as f64;
            let nearest = self
                .tracks
                .iter()
                .enumerate()
                .filter(|(index, _)| !claimed[*index])
                .map(|(index, track)| (index, (track.position - z).abs()))
                .filter(|(_, distance)| *distance <= window)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            match nearest {
                Some((index, _)) => {
                    claimed[index] = true;
                    self.tracks[index].observe(
                        detection.peak_index,
                        detection.peak,
                        measurement_noise,
                        seq,
                        persistence_cap,
                    );
                }
                None => unmatched.push(detection),
            }
        }

        let threshold = self.config.consistency_samples;
        for (index, track) in self.tracks.iter_mut().enumerate() {
            if !claimed[index] {
                track.miss(threshold);
            }
        }
        self.tracks
            .retain(|track| track.persistence > 0 && track.misses <= MISS_BOUND);

        for detection in unmatched {
            if self.tracks.len() >= self.config.n_max {
                break;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(Track::new(
                id,
                detection.peak_index,
                detection.peak,
                seq,
                INITIAL_COVARIANCE,
                (self.config.consistency_samples as usize) * 2,
            ));
        }
    }

    fn association_window(&self, amplitude: u16) -> f64 {
        let boost = (amplitude as f64 / AMPLITUDE_BOOST_REF).min(1.0) * MAX_TOLERANCE_BOOST;
        self.config.position_tolerance + boost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(index: usize, peak: u16) -> Detection {
        Detection {
            start: index,
            end: index + 3,
            peak_index: index,
            peak,
            width: 3,
            range_cm: 0.0,
        }
    }

    fn tracker() -> Tracker {
        Tracker::new(DetectorConfig::default())
    }

    #[test]
    fn persistence_gates_until_the_consistency_count() {
        let mut tracker = tracker();
        for seq in 0..9 {
            tracker.step(&[det(700, 200)], 0.0, seq);
            assert_eq!(tracker.persistent_tracks().count(), 0);
        }
        tracker.step(&[det(700, 200)], 0.0, 9);
        assert_eq!(tracker.persistent_tracks().count(), 1);
        assert_eq!(tracker.primary(0).unwrap().median_index(), 700);
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut tracker = tracker();
        tracker.step(&[det(100, 200)], 0.0, 0);
        let first_id = tracker.tracks()[0].id;

        // A provisional track dies on its first miss.
        tracker.step(&[], 0.0, 1);
        assert!(tracker.tracks().is_empty());

        tracker.step(&[det(100, 200)], 0.0, 2);
        assert!(tracker.tracks()[0].id > first_id);
    }

    #[test]
    fn silence_destroys_every_track() {
        let mut tracker = tracker();
        for seq in 0..15 {
            tracker.step(&[det(300, 200), det(900, 150)], 0.0, seq);
        }
        assert_eq!(tracker.tracks().len(), 2);
        for seq in 15..40 {
            tracker.step(&[], 0.0, seq);
        }
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn persistence_is_bounded_above() {
        let mut tracker = tracker();
        for seq in 0..40 {
            tracker.step(&[det(500, 200)], 0.0, seq);
        }
        let cap = DetectorConfig::default().consistency_samples + PERSISTENCE_HEADROOM;
        assert_eq!(tracker.tracks()[0].persistence, cap);
    }

    #[test]
    fn strong_echoes_associate_across_a_wider_window() {
        let mut tracker = tracker();
        tracker.step(&[det(700, 600)], 0.0, 0);
        tracker.step(&[det(700, 600)], 0.0, 1);
        tracker.step(&[det(715, 600)], 0.0, 2);
        // window = 12 + 8, so the jump of 15 stays on the same track
        assert_eq!(tracker.tracks().len(), 1);

        let mut weak = Tracker::new(DetectorConfig::default());
        weak.step(&[det(700, 10)], 0.0, 0);
        weak.step(&[det(700, 10)], 0.0, 1);
        weak.step(&[det(715, 10)], 0.0, 2);
        // the weak jump falls outside the window and opens a second track
        assert_eq!(weak.tracks().len(), 2);
    }

    #[test]
    fn track_count_is_capped_at_n_max() {
        let mut config = DetectorConfig::default();
        config.n_max = 3;
        let mut tracker = Tracker::new(config);
        let detections: Vec<Detection> = (0..6).map(|k| det(100 + k * 100, 200)).collect();
        tracker.step(&detections, 0.0, 0);
        assert_eq!(tracker.tracks().len(), 3);
    }

    #[test]
    fn primary_is_the_closest_persistent_track_past_the_blind_zone() {
        let mut tracker = tracker();
        for seq in 0..12 {
            tracker.step(&[det(300, 200), det(600, 200)], 0.0, seq);
        }
        assert_eq!(tracker.primary(0).unwrap().median_index(), 300);
        assert_eq!(tracker.primary(400).unwrap().median_index(), 600);
        assert!(tracker.primary(700).is_none());
    }

    #[test]
    fn jittered_echo_keeps_one_identity() {
        let mut tracker = tracker();
        let indices = [700usize, 703, 698, 701, 699, 702, 700, 700, 701, 700, 699, 700];
        for (seq, &index) in indices.iter().enumerate() {
            tracker.step(&[det(index, 300)], 0.0, seq as u64);
        }
        assert_eq!(tracker.tracks().len(), 1);
        let track = &tracker.tracks()[0];
        assert!(track.is_persistent(10));
        assert!((track.position - 700.0).abs() < 3.0);
        assert_eq!(track.id, 0);
    }
}
