use log::{info, warn};
use std::time::{Duration, Instant};

pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits at most one warning per window; the rest are counted.
pub struct WarnLimiter {
    window: Duration,
    last_emit: Option<Instant>,
    suppressed: u64,
}

impl WarnLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: None,
            suppressed: 0,
        }
    }

    pub fn warn(&mut self, message: &str) {
        let now = Instant::now();
        let due = match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= self.window,
        };
        if due {
            if self.suppressed > 0 {
                warn!("{} ({} similar suppressed)", message, self.suppressed);
            } else {
                warn!("{}", message);
            }
            self.last_emit = Some(now);
            self.suppressed = 0;
        } else {
            self.suppressed += 1;
        }
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_suppresses_within_window() {
        let mut limiter = WarnLimiter::new(Duration::from_secs(60));
        limiter.warn("first");
        limiter.warn("second");
        limiter.warn("third");
        assert_eq!(limiter.suppressed(), 2);
    }

    #[test]
    fn limiter_emits_after_window_elapses() {
        let mut limiter = WarnLimiter::new(Duration::from_millis(0));
        limiter.warn("first");
        limiter.warn("second");
        assert_eq!(limiter.suppressed(), 0);
    }
}
