//! Session clock used for frame timing and time-driven animation.

use std::time::{Duration, Instant};

/// Timing snapshot taken once per frame.
///
/// Every consumer within a frame reads the same snapshot, so animations
/// driven by `elapsed` agree with each other exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous snapshot.
    pub delta: f32,
    /// Seconds since the timer was started.
    pub elapsed: f32,
}

/// Monotonic timer measuring session time and per-frame deltas.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total time since the timer was created or last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total time in seconds since the timer was created or last reset.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Take a frame snapshot and advance the delta reference point.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        FrameTime {
            delta: delta.as_secs_f32(),
            elapsed: (now - self.start).as_secs_f32(),
        }
    }

    /// Restart both the session clock and the delta reference point.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_monotonic() {
        let mut timer = Timer::new();
        let first = timer.tick();
        std::thread::sleep(Duration::from_millis(2));
        let second = timer.tick();

        assert!(first.delta >= 0.0);
        assert!(second.elapsed >= first.elapsed);
        assert!(second.delta > 0.0);
    }

    #[test]
    fn test_reset_restarts_elapsed() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        timer.reset();
        assert!(timer.elapsed() < Duration::from_millis(5));
    }
}
