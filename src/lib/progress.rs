//! Progress reporting shared across scan workers.

use crate::logging::format_count;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counter that logs a line each time the running total crosses a multiple of
/// its interval.
///
/// ```
/// use fgslice_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Scanned records").with_interval(100);
/// for _ in 0..250 {
///     tracker.record(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Scanned records 250 (complete)"
/// ```
pub struct ProgressTracker {
    interval: u64,
    label: String,
    total: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with the default interval of 1,000,000.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self { interval: 1_000_000, label: label.into(), total: AtomicU64::new(0) }
    }

    /// Sets the logging interval; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `n` to the running total, logging every interval boundary crossed.
    ///
    /// Returns the new total.
    pub fn record(&self, n: u64) -> u64 {
        if n == 0 {
            return self.count();
        }
        let before = self.total.fetch_add(n, Ordering::Relaxed);
        let after = before + n;
        let mut milestone = (before / self.interval + 1) * self.interval;
        while milestone <= after {
            info!("{} {}", self.label, format_count(milestone));
            milestone += self.interval;
        }
        after
    }

    /// Logs the final total unless it already landed on an interval boundary.
    pub fn log_final(&self) {
        let total = self.count();
        if total > 0 && total % self.interval != 0 {
            info!("{} {} (complete)", self.label, format_count(total));
        }
    }

    /// The running total.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
