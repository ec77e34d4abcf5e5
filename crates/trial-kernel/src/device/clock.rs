//! Clocks: where phase timing comes from.

use std::time::{Duration, Instant};

/// Source of time for a session, in seconds since the session started.
///
/// `wait` blocks the caller until the given time has elapsed.
pub trait Clock: Send {
    fn now(&self) -> f64;

    fn wait(&mut self, seconds: f64);
}

/// Simulated time: waits advance the clock instantly.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: f64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn wait(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.now += seconds;
        }
    }
}

/// Real time: waits sleep the current thread.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn wait(&mut self, seconds: f64) {
        if seconds > 0.0 && seconds.is_finite() {
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_advances_on_wait() {
        let mut clock = VirtualClock::new();
        assert_eq!(clock.now(), 0.0);
        clock.wait(0.5);
        clock.wait(0.25);
        assert!((clock.now() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_virtual_clock_ignores_negative_waits() {
        let mut clock = VirtualClock::new();
        clock.wait(-1.0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let mut clock = WallClock::new();
        let before = clock.now();
        clock.wait(0.001);
        assert!(clock.now() > before);
    }
}
