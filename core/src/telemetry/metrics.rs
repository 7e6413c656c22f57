use std::sync::Mutex;

/// Shared counters for the end-to-end pipeline.
pub struct PipelineMetrics {
    inner: Mutex<Counters>,
}

#[derive(Default, Clone)]
struct Counters {
    frames: u64,
    checksum_failures: u64,
    bytes_discarded: u64,
    detections: u64,
    raw_records: u64,
    db_rows: u64,
    db_failures: u64,
    gps_fixes: u64,
    gps_parse_failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub checksum_failures: u64,
    pub bytes_discarded: u64,
    pub detections: u64,
    pub raw_records: u64,
    pub db_rows: u64,
    pub db_failures: u64,
    pub gps_fixes: u64,
    pub gps_parse_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    pub fn record_frame(&self, detections: u64) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.frames += 1;
            counters.detections += detections;
        }
    }

    pub fn record_resync(&self, checksum_failures: u64, bytes_discarded: u64) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.checksum_failures += checksum_failures;
            counters.bytes_discarded += bytes_discarded;
        }
    }

    pub fn record_raw_records(&self, count: u64) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.raw_records += count;
        }
    }

    pub fn record_db_row(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.db_rows += 1;
        }
    }

    pub fn record_db_failure(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.db_failures += 1;
        }
    }

    pub fn record_gps_fix(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.gps_fixes += 1;
        }
    }

    pub fn record_gps_parse_failure(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.gps_parse_failures += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = match self.inner.lock() {
            Ok(counters) => counters.clone(),
            Err(_) => Counters::default(),
        };
        MetricsSnapshot {
            frames: counters.frames,
            checksum_failures: counters.checksum_failures,
            bytes_discarded: counters.bytes_discarded,
            detections: counters.detections,
            raw_records: counters.raw_records,
            db_rows: counters.db_rows,
            db_failures: counters.db_failures,
            gps_fixes: counters.gps_fixes,
            gps_parse_failures: counters.gps_parse_failures,
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.record_frame(3);
        metrics.record_frame(0);
        metrics.record_resync(1, 42);
        metrics.record_db_row();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames, 2);
        assert_eq!(snapshot.detections, 3);
        assert_eq!(snapshot.checksum_failures, 1);
        assert_eq!(snapshot.bytes_discarded, 42);
        assert_eq!(snapshot.db_rows, 1);
    }
}
