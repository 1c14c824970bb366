//! Explicit tempo and position context.

use crate::time::{BarBeatTime, DEFAULT_BPM, TICKS_PER_QUARTER};

/// Tempo plus a running tick position.
///
/// Anything that converts between ticks and wall time takes a `Clock`
/// rather than reading a shared tempo.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clock {
    pub bpm: f64,
    pub ticks_per_quarter: u32,
    pub ticks: u64,
}

impl Clock {
    pub fn new(bpm: f64) -> Self {
        Self { bpm, ticks_per_quarter: TICKS_PER_QUARTER, ticks: 0 }
    }

    pub fn seconds_per_tick(&self) -> f64 {
        60.0 / (self.bpm * self.ticks_per_quarter as f64)
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.seconds_per_tick()
    }

    /// Nearest whole tick for a span of seconds.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        libm::round(seconds / self.seconds_per_tick()) as u64
    }

    /// Current position.
    pub fn time(&self) -> BarBeatTime {
        let mut time = BarBeatTime::from_ticks(self.ticks);
        time.bpm = libm::round(self.bpm) as u16;
        time
    }

    pub fn advance(&mut self, ticks: u64) {
        self.ticks = self.ticks.saturating_add(ticks);
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.bpm = bpm;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_BPM as f64)
    }
}
