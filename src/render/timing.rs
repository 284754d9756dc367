//! Wall-clock time of one full image.

use std::time::{Duration, Instant};

/// Measures from the first batch of a cycle to the batch that converges it.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    started: Option<Instant>,
}

impl FrameTimer {
    /// Start timing a new cycle.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    /// Drop a running measurement (the cycle was restarted).
    pub fn cancel(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Finish the running measurement.
    ///
    /// `Instant` arithmetic carries nanoseconds into seconds, so a cycle
    /// spanning a second boundary is measured correctly. A clock that went
    /// backwards yields zero rather than wrapping.
    pub fn stop(&mut self, now: Instant) -> Option<Duration> {
        self.started
            .take()
            .map(|start| now.saturating_duration_since(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measures_across_second_boundary() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::default();
        timer.start(t0 + Duration::from_millis(900));
        let elapsed = timer.stop(t0 + Duration::from_millis(2_100)).unwrap();
        assert_eq!(elapsed, Duration::from_millis(1_200));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_stop_without_start() {
        let mut timer = FrameTimer::default();
        assert_eq!(timer.stop(Instant::now()), None);
    }

    #[test]
    fn test_cancel() {
        let mut timer = FrameTimer::default();
        timer.start(Instant::now());
        timer.cancel();
        assert_eq!(timer.stop(Instant::now()), None);
    }

    #[test]
    fn test_backwards_clock_is_zero() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut timer = FrameTimer::default();
        timer.start(t0);
        assert_eq!(timer.stop(t0 - Duration::from_millis(5)), Some(Duration::ZERO));
    }
}
