//! Tick timing

use super::sample_window::SampleWindow;
use std::time::Duration;

#[derive(Debug)]
pub struct TickTimer {
    ticks: u64,
    durations: SampleWindow<Duration>,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ticks: 0,
            durations: SampleWindow::new(capacity),
        }
    }

    /// Record one tick's duration.
    pub fn record(&mut self, elapsed: Duration) {
        self.durations.push(elapsed);
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn average(&self) -> Duration {
        self.durations.average()
    }

    pub fn average_ms(&self) -> f64 {
        self.average().as_secs_f64() * 1000.0
    }

    pub fn slowest(&self) -> Duration {
        self.durations.max()
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(120)
    }
}
