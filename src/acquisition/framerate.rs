//! Achieved emission rate.
//!
//! The meter keeps the timestamps of the last `window` emissions and publishes
//! the mean rate over them through a `tokio::sync::watch` channel. Observers
//! subscribe with [`FramerateMeter::subscribe`] or get the receiver handed out
//! by the loop:
//!
//! ```rust,ignore
//! let mut rx = surface.framerate.clone();
//! tokio::spawn(async move {
//!     while rx.changed().await.is_ok() {
//!         println!("{:.1} fps", *rx.borrow());
//!     }
//! });
//! ```

use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::watch;

/// Default number of emissions averaged by the meter.
pub const DEFAULT_FRAMERATE_WINDOW: usize = 20;

/// Moving-window framerate estimate.
#[derive(Debug)]
pub struct FramerateMeter {
    window: usize,
    marks: VecDeque<Instant>,
    tx: watch::Sender<f64>,
}

impl FramerateMeter {
    /// Meter averaging over the last `window` emissions (at least two).
    pub fn new(window: usize) -> Self {
        let (tx, _) = watch::channel(0.0);
        Self::with_sender(window, tx)
    }

    /// Meter publishing on an existing watch channel.
    pub fn with_sender(window: usize, tx: watch::Sender<f64>) -> Self {
        let window = window.max(2);
        Self {
            window,
            marks: VecDeque::with_capacity(window),
            tx,
        }
    }

    /// New observer of the published rate.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }

    /// Record one emission at `at` and publish the updated rate.
    pub fn tick(&mut self, at: Instant) {
        if self.marks.len() == self.window {
            self.marks.pop_front();
        }
        self.marks.push_back(at);
        let rate = self.rate();
        if rate > 0.0 {
            self.tx.send_replace(rate);
        }
    }

    /// Current estimate in Hz; zero until two emissions are recorded.
    pub fn rate(&self) -> f64 {
        match (self.marks.front(), self.marks.back()) {
            (Some(first), Some(last)) if self.marks.len() >= 2 => {
                let span = last.saturating_duration_since(*first).as_secs_f64();
                if span > 0.0 {
                    (self.marks.len() - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Drop all recorded emissions; used when the pacing target changes.
    pub fn reset(&mut self) {
        self.marks.clear();
    }
}

impl Default for FramerateMeter {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMERATE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_from_regular_ticks() {
        let mut meter = FramerateMeter::new(5);
        let rx = meter.subscribe();
        let start = Instant::now();
        for i in 0..10 {
            meter.tick(start + Duration::from_millis(10 * i));
        }
        assert!((meter.rate() - 100.0).abs() < 1e-6);
        assert!((*rx.borrow() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_tick_has_no_rate() {
        let mut meter = FramerateMeter::default();
        meter.tick(Instant::now());
        assert_eq!(meter.rate(), 0.0);
        meter.reset();
        assert_eq!(meter.rate(), 0.0);
    }
}
