//! Rate limiting for frame emission.
//!
//! The pacer only ever *adds* delay: if processing an iteration already took
//! longer than the target interval, the next frame goes out immediately and
//! nothing is done to catch up. The mark is taken when a frame is actually
//! emitted, so the error of one sleep does not carry into the next interval.

use std::time::{Duration, Instant};

/// Time left to wait before the next emission.
///
/// `max(0, target − elapsed_since(last_mark))`; with no mark the answer is zero.
pub fn compute_delay(target: Duration, last_mark: Option<Instant>, now: Instant) -> Duration {
    match last_mark {
        Some(mark) => target.saturating_sub(now.saturating_duration_since(mark)),
        None => Duration::ZERO,
    }
}

/// Converts a rate in Hz into an interval. Non-positive or non-finite rates
/// mean "unpaced".
pub fn interval_for_rate(rate_hz: f64) -> Option<Duration> {
    (rate_hz.is_finite() && rate_hz > 0.0).then(|| Duration::from_secs_f64(1.0 / rate_hz))
}

/// Pacing state: target interval and last emission mark.
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    interval: Option<Duration>,
    last_mark: Option<Instant>,
}

impl Pacer {
    /// Pacer targeting `rate_hz`.
    pub fn new(rate_hz: f64) -> Self {
        Self {
            interval: interval_for_rate(rate_hz),
            last_mark: None,
        }
    }

    /// Retarget to `rate_hz`. The mark is kept.
    pub fn set_rate(&mut self, rate_hz: f64) {
        self.interval = interval_for_rate(rate_hz);
    }

    /// Current target interval.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Last emission time.
    pub fn last_mark(&self) -> Option<Instant> {
        self.last_mark
    }

    /// Delay owed at `now`.
    pub fn delay(&self, now: Instant) -> Duration {
        match self.interval {
            Some(interval) => compute_delay(interval, self.last_mark, now),
            None => Duration::ZERO,
        }
    }

    /// Sleep for the owed delay, if any.
    pub fn wait(&self) {
        let delay = self.delay(Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    /// Record an emission at `at`.
    pub fn mark(&mut self, at: Instant) {
        self.last_mark = Some(at);
    }

    /// Forget the last mark so the next emission is immediate.
    pub fn reset(&mut self) {
        self.last_mark = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_mark_means_no_delay() {
        let now = Instant::now();
        assert_eq!(compute_delay(Duration::from_millis(10), None, now), Duration::ZERO);
    }

    #[test]
    fn test_delay_is_remaining_interval() {
        let mark = Instant::now();
        let now = mark + Duration::from_millis(3);
        assert_eq!(
            compute_delay(Duration::from_millis(10), Some(mark), now),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn test_slow_processing_adds_no_delay() {
        let mark = Instant::now();
        let now = mark + Duration::from_millis(25);
        assert_eq!(
            compute_delay(Duration::from_millis(10), Some(mark), now),
            Duration::ZERO
        );
    }

    #[test]
    fn test_rate_conversion() {
        assert_eq!(interval_for_rate(100.0), Some(Duration::from_millis(10)));
        assert_eq!(interval_for_rate(0.0), None);
        assert_eq!(interval_for_rate(f64::NAN), None);
    }

    #[test]
    fn test_reset_forgets_mark() {
        let mut pacer = Pacer::new(10.0);
        let now = Instant::now();
        pacer.mark(now);
        assert!(pacer.delay(now) > Duration::ZERO);
        pacer.reset();
        assert_eq!(pacer.delay(now), Duration::ZERO);
    }

    #[test]
    fn test_wait_enforces_minimum_interval() {
        let mut pacer = Pacer::new(200.0);
        let mut marks = Vec::new();
        for _ in 0..10 {
            pacer.wait();
            let now = Instant::now();
            pacer.mark(now);
            marks.push(now);
        }
        for pair in marks.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(5));
        }
    }
}
