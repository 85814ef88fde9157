//! Virtual frame clock
//!
//! Simulation time advances only when the host steps it, which keeps every
//! timed wait (keyframe offsets, start delays, debounce settle delays)
//! deterministic and reproducible in tests.

/// A controllable simulation clock counted in seconds and frames
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    /// Current simulation time in seconds.
    now: f64,
    /// Number of completed frames.
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at a specific time.
    pub fn starting_at(now: f64) -> Self {
        Self { now, frame: 0 }
    }

    /// Current simulation time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Index of the current frame.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance by `dt` seconds and begin a new frame. Negative or NaN steps
    /// are treated as zero so time never runs backwards.
    pub fn advance(&mut self, dt: f64) -> f64 {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt;
        }
        self.frame += 1;
        self.now
    }

    pub fn reset(&mut self) {
        self.now = 0.0;
        self.frame = 0;
    }
}
