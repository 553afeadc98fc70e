//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a decode run and
//! [`ProgressInfo`] for the snapshots delivered to it. The driver reports
//! once every [`progress_interval`](crate::DecodeOptions::with_progress_interval)
//! frames and once more when the stream is exhausted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use videodecode::{DecodeDriver, DecodeOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% decoded");
//!         }
//!     }
//! }
//!
//! let options = DecodeOptions::new("input.mp4")
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_progress_interval(30);
//! let summary = DecodeDriver::open(options)?.run()?;
//! # Ok::<(), videodecode::DecodeError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot of decode progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames handed out by the decode session so far.
    pub current: u64,
    /// Estimated total frames, when the container reports one.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since decoding started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// PTS of the most recent frame, in stream time base.
    pub current_pts: Option<i64>,
    /// `true` for the last report of a run.
    pub finished: bool,
}

/// Trait for receiving progress updates during a decode run.
///
/// Callbacks observe the run but cannot stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals while decoding.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    interval: u64,
    start_time: Instant,
    since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: Option<u64>,
        interval: u64,
    ) -> Self {
        Self {
            callback,
            total: total.filter(|&t| t > 0),
            current: 0,
            interval: interval.max(1),
            start_time: Instant::now(),
            since_last_report: 0,
        }
    }

    /// Record `frames` completed frames and report if the interval is reached.
    pub(crate) fn advance(&mut self, frames: u64, pts: Option<i64>) {
        if frames == 0 {
            return;
        }
        self.current += frames;
        self.since_last_report += frames;

        if self.since_last_report >= self.interval {
            self.report(pts, false);
            self.since_last_report = 0;
        }
    }

    /// Unconditionally emit the final report.
    pub(crate) fn finish(&mut self) {
        self.report(None, true);
    }

    fn report(&self, pts: Option<i64>, finished: bool) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .map(|t| ((self.current as f32 / t as f32) * 100.0).min(100.0));

        let estimated_remaining = if self.current > 0 && !finished {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_pts: pts,
            finished,
        });
    }
}
