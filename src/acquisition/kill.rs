//! Cancellation signal for the acquisition worker.
//!
//! Any owner can set the signal; the loop polls it once per iteration with a
//! short bounded wait. Setting is sticky.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    set: AtomicBool,
    // Paired with `condvar`; MUST be locked when notifying to avoid missed wakeups.
    mutex: Mutex<bool>,
    condvar: Condvar,
}

/// Binary, clonable kill flag.
#[derive(Debug, Clone, Default)]
pub struct KillSignal {
    inner: Arc<Inner>,
}

impl KillSignal {
    /// Unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake any waiter.
    pub fn set(&self) {
        self.inner.set.store(true, Ordering::Release);
        let mut guard = match self.inner.mutex.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = true;
        self.inner.condvar.notify_all();
    }

    /// Non-blocking check.
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for the signal; returns whether it is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() || timeout.is_zero() {
            return self.is_set();
        }
        let guard = match self.inner.mutex.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = self
            .inner
            .condvar
            .wait_timeout_while(guard, timeout, |set| !*set);
        match result {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_unset_wait_times_out() {
        let kill = KillSignal::new();
        let start = Instant::now();
        assert!(!kill.wait_timeout(Duration::from_millis(5)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_set_is_visible_to_clones() {
        let kill = KillSignal::new();
        let other = kill.clone();
        other.set();
        assert!(kill.is_set());
        assert!(kill.wait_timeout(Duration::from_secs(1)));
    }

    #[test]
    fn test_set_wakes_waiter() {
        let kill = KillSignal::new();
        let waiter = kill.clone();
        let handle = std::thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));
        std::thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        kill.set();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
