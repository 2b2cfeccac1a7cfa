use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Iterations per second, measured over one-second windows.
#[derive(Debug)]
pub struct PerformanceCounter {
    ticks: u64,
    last_report: Instant,
    rates: [f64; 30],
    rate_index: usize,
    samples: usize,
}

impl Default for PerformanceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceCounter {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            last_report: Instant::now(),
            rates: [0.0; 30],
            rate_index: 0,
            samples: 0,
        }
    }

    /// Count one tick. Returns the rate over the window that just ended, once
    /// per reporting interval.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.ticks += 1;
        let elapsed = now.duration_since(self.last_report);
        if elapsed < REPORT_INTERVAL {
            return None;
        }

        let rate = self.ticks as f64 / elapsed.as_secs_f64();
        self.rates[self.rate_index] = rate;
        self.rate_index = (self.rate_index + 1) % self.rates.len();
        self.samples = (self.samples + 1).min(self.rates.len());

        self.ticks = 0;
        self.last_report = now;
        Some(rate)
    }

    /// Mean of the recent reported rates.
    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.rates.iter().sum::<f64>() / self.samples as f64
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
