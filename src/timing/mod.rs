//! Monotonic capture clock for frame timestamps.

use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock that drivers stamp frames with.
///
/// Clones share the same time zero, so every frame of a stream derives from one
/// timebase and timestamps never go backwards.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Arc<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Use this to share the same timebase between components.
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Nanoseconds since the clock was created.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Nanoseconds between clock start and `instant`; zero for earlier instants.
    #[inline]
    pub fn ns_at(&self, instant: Instant) -> u64 {
        u64::try_from(instant.saturating_duration_since(*self.start).as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = FrameClock::new();
        let a = clock.now_ns();
        std::thread::sleep(Duration::from_millis(1));
        let b = clock.now_ns();
        assert!(b > a);
    }

    #[test]
    fn test_clones_share_timebase() {
        let clock = FrameClock::new();
        let copy = clock.clone();
        assert_eq!(clock.start_instant(), copy.start_instant());
    }

    #[test]
    fn test_earlier_instant_is_zero() {
        let earlier = Instant::now();
        std::thread::sleep(Duration::from_millis(1));
        let clock = FrameClock::new();
        assert_eq!(clock.ns_at(earlier), 0);
    }
}
