//! Logging helpers for formatted summaries.
//!
//! Consistent number, duration and rate formatting for log output, plus an operation timer and
//! the end-of-run slice summary.

use std::time::{Duration, Instant};

use crate::metrics::SliceMetrics;

/// Formats a count with thousands separators.
///
/// ```
/// use fgslice_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with the given number of decimals.
///
/// ```
/// use fgslice_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration as e.g. "45s", "2m 15s" or "1h 30m".
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => match (secs / 60, secs % 60) {
            (m, 0) => format!("{m}m"),
            (m, s) => format!("{m}m {s}s"),
        },
        _ => match (secs / 3600, (secs % 3600) / 60) {
            (h, 0) => format!("{h}h"),
            (h, m) => format!("{h}h {m}m"),
        },
    }
}

/// Formats a record rate, falling back to records/min for slow rates.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        format!("{:.1} records/min", rate * 60.0)
    }
}

/// Logs the end-of-run slice summary.
#[allow(clippy::cast_precision_loss)]
pub fn log_slice_summary(metrics: &SliceMetrics) {
    log::info!("Slice Summary:");
    log::info!("  Partitions: {}", format_count(metrics.partitions));
    log::info!(
        "  Phase one: {} scanned, {} written, {} duplicates, {} owned elsewhere",
        format_count(metrics.phase_one_records_scanned),
        format_count(metrics.phase_one_records_written),
        format_count(metrics.duplicate_records),
        format_count(metrics.ownership_skips)
    );
    if metrics.filtered_records > 0 {
        log::info!("  Filtered (non-supplementary): {}", format_count(metrics.filtered_records));
    }
    if metrics.truncated_partitions > 0 {
        log::info!("  Partitions halted by record budget: {}", metrics.truncated_partitions);
    }
    log::info!(
        "  Pending positions: {} in {} consolidated regions",
        format_count(metrics.pending_positions),
        format_count(metrics.consolidated_regions)
    );
    log::info!(
        "  Phase two: {} windows, {} scanned, {} matched, {} written",
        format_count(metrics.remote_groups),
        format_count(metrics.remote_records_scanned),
        format_count(metrics.remote_records_matched),
        format_count(metrics.remote_records_written)
    );
    if metrics.remote_records_scanned > 0 {
        let hit_rate = metrics.remote_records_matched as f64 / metrics.remote_records_scanned as f64;
        log::info!("  Remote hit rate: {}", format_percent(hit_rate, 2));
    }
    log::info!("  Fragments completed: {}", format_count(metrics.fragments_completed));
    log::info!(
        "  Fragments incomplete: {} unresolved, {} only missing in excluded regions",
        format_count(metrics.fragments_unresolved),
        format_count(metrics.fragments_excluded)
    );
    if metrics.fragments_unresolved > 0 {
        log::info!(
            "  Missing records: {} searched but not found, {} never searched",
            format_count(metrics.missing_records_searched),
            format_count(metrics.missing_records_unsearched)
        );
    }
    if metrics.write_failures > 0 {
        log::warn!("  Write failures: {}", format_count(metrics.write_failures));
    }
}

/// Times an operation and logs its start and completion.
///
/// ```no_run
/// use fgslice_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Slicing BAM");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time elapsed since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} records in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
