//! Time sources for the circuit breaker
//!
//! The breaker never reads the wall clock directly. It asks a [`Clock`] for
//! monotonic seconds, which keeps recovery timing immune to NTP adjustments
//! and lets tests advance time without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic time in seconds
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Seconds elapsed since an arbitrary, fixed origin
    fn monotonic_time(&self) -> f64;
}

/// Clock backed by [`Instant`], anchored at creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start_time: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for deterministic tests and simulations
///
/// Time only moves when [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) is called. Share it with the breaker through an
/// `Arc` and keep a handle to move it forward.
///
/// ```rust
/// use power_breaker::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_secs(301));
/// assert_eq!(clock.monotonic_time(), 301.0);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 seconds stored as raw bits
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading 0.0
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    /// Create a clock reading `secs`
    pub fn starting_at(secs: f64) -> Self {
        Self {
            now: AtomicU64::new(secs.to_bits()),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let step = by.as_secs_f64();
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + step).to_bits())
            });
    }

    /// Jump to an absolute reading
    pub fn set(&self, secs: f64) {
        self.now.store(secs.to_bits(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn monotonic_time(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let t1 = clock.monotonic_time();
        let t2 = clock.monotonic_time();
        assert!(t2 >= t1);
        assert!(t1 >= 0.0);
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new();
        assert_eq!(clock.monotonic_time(), 0.0);

        clock.advance(Duration::from_secs(10));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.monotonic_time(), 10.5);

        clock.set(1000.0);
        assert_eq!(clock.monotonic_time(), 1000.0);
    }

    #[test]
    fn test_manual_clock_shared_across_threads() {
        let clock = Arc::new(ManualClock::starting_at(5.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        clock.advance(Duration::from_secs(1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(clock.monotonic_time(), 405.0);
    }
}
