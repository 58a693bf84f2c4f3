//! Time management utilities

use std::time::Instant;

/// Frame clock returning the time elapsed between successive calls
pub struct Clock {
    last_tick: Instant,
    elapsed: f32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            elapsed: 0.0,
        }
    }

    /// Seconds since the previous call (or since creation)
    pub fn get_delta(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.elapsed += delta;
        delta
    }

    /// Total seconds handed out by [`Clock::get_delta`]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}
