//! Progress reporting shared by the command runner and the HTTP service.
//!
//! A content fetcher reports through the [`ProgressSink`] trait. Two
//! implementations exist:
//! - [`ConsoleProgress`]: draws a progress bar on the terminal
//! - [`JobProgress`]: mutates a job record that is later polled
//!
//! Both keep their counters in a [`ProgressState`] behind a read/write lock,
//! so every mutation is serialized and readers see a consistent view.

pub mod console;
pub mod format;
pub mod polling;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub use console::ConsoleProgress;
pub use polling::JobProgress;

/// Capability handed to a content fetcher.
///
/// All methods take `&self`; implementations synchronize internally and may
/// be called from any thread.
pub trait ProgressSink: Send + Sync {
    /// Record the resolved title name
    fn set_display_name(&self, name: &str);

    /// Record the expected total size once known
    fn set_total_expected(&self, bytes: u64);

    /// Start the rate clock. Only the first call has an effect.
    fn set_start_time(&self, at: Instant);

    /// Upsert the byte count of one file and recompute the aggregate
    fn update_file_progress(&self, file: &str, bytes_so_far: u64);

    /// Post-download transform progress in `0.0..=1.0`
    fn update_transform_progress(&self, fraction: f64);

    fn is_cancelled(&self) -> bool;

    fn request_cancel(&self);

    /// Clear byte counters and file counts for a new counting phase
    fn reset_counters(&self);

    /// Count a finished file (reporting only)
    fn mark_file_complete(&self, file: &str);
}

/// Derived transfer metrics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressMetrics {
    pub downloaded: u64,
    pub total: Option<u64>,
    /// 0..=100, zero while the total is unknown
    pub percent: f64,
    pub speed_bps: f64,
    /// `None` when total or speed is unknown
    pub eta: Option<Duration>,
}

/// Counters accumulated for one run
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    display_name: Option<String>,
    total_expected: Option<u64>,
    per_file: HashMap<String, u64>,
    aggregate: u64,
    start_time: Option<Instant>,
    cancelled: bool,
    files_completed: u32,
    transform_fraction: Option<f64>,
    speed_bps: f64,
    eta: Option<Duration>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = Some(name.into());
    }

    pub fn total_expected(&self) -> Option<u64> {
        self.total_expected
    }

    pub fn set_total_expected(&mut self, bytes: u64) {
        self.total_expected = Some(bytes);
        self.recompute_eta();
    }

    /// Set the start time if it has not been set yet
    pub fn start_clock(&mut self, at: Instant) {
        self.start_time.get_or_insert(at);
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    pub fn update_file(&mut self, file: &str, bytes_so_far: u64) {
        self.update_file_at(file, bytes_so_far, Instant::now());
    }

    /// Upsert one file and recompute aggregate, speed and ETA as of `now`.
    ///
    /// The aggregate is summed from scratch: files may restart or resume, so
    /// only the latest value per file counts.
    pub fn update_file_at(&mut self, file: &str, bytes_so_far: u64, now: Instant) {
        let start = *self.start_time.get_or_insert(now);
        self.per_file.insert(file.to_string(), bytes_so_far);
        self.aggregate = self
            .per_file
            .values()
            .fold(0u64, |acc, bytes| acc.saturating_add(*bytes));

        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        self.speed_bps = if elapsed > 0.0 {
            self.aggregate as f64 / elapsed
        } else {
            0.0
        };
        self.recompute_eta();
    }

    fn recompute_eta(&mut self) {
        self.eta = match self.total_expected {
            Some(total) if self.speed_bps > 0.0 => {
                let remaining = total.saturating_sub(self.aggregate) as f64;
                // Out-of-range estimates are reported as unknown
                Duration::try_from_secs_f64(remaining / self.speed_bps).ok()
            }
            _ => None,
        };
    }

    pub fn file_bytes(&self, file: &str) -> Option<u64> {
        self.per_file.get(file).copied()
    }

    /// Number of distinct files seen in the current phase
    pub fn file_count(&self) -> usize {
        self.per_file.len()
    }

    pub fn aggregate(&self) -> u64 {
        self.aggregate
    }

    pub fn set_transform_fraction(&mut self, fraction: f64) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.transform_fraction = Some(fraction);
    }

    pub fn transform_fraction(&self) -> Option<f64> {
        self.transform_fraction
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Set the cancellation flag. Returns `false` if it was already set.
    pub fn cancel(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }

    pub fn reset(&mut self) {
        self.per_file.clear();
        self.aggregate = 0;
        self.total_expected = None;
        self.files_completed = 0;
        self.speed_bps = 0.0;
        self.eta = None;
    }

    /// Increment the completed-file counter and return the new count
    pub fn mark_file_complete(&mut self) -> u32 {
        self.files_completed += 1;
        self.files_completed
    }

    pub fn files_completed(&self) -> u32 {
        self.files_completed
    }

    /// Metrics as of the last update
    pub fn metrics(&self) -> ProgressMetrics {
        let percent = match self.total_expected {
            Some(total) if total > 0 => (self.aggregate as f64 * 100.0 / total as f64).min(100.0),
            _ => 0.0,
        };

        ProgressMetrics {
            downloaded: self.aggregate,
            total: self.total_expected,
            percent,
            speed_bps: self.speed_bps,
            eta: self.eta,
        }
    }
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
