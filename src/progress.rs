//! Scan progress, lifecycle phases and cooperative cancellation.
//!
//! During a scan every worker owns one [`WorkerProgress`] record and is the
//! only writer of its `frames_processed` counter. A reporter thread samples
//! all records at [`ScanOptions::with_report_interval`](crate::ScanOptions)
//! cadence and hands a [`ProgressInfo`] snapshot to the configured
//! [`ProgressCallback`]. Snapshots are observational only: the scan never
//! reads them back to make decisions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use peakclip::{FfmpegSource, PeakScanner, ProgressCallback, ProgressInfo, ScanOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.phase);
//!         }
//!     }
//! }
//!
//! let options = ScanOptions::new().with_progress(Arc::new(PrintProgress));
//! let result = PeakScanner::new(options).scan(&FfmpegSource::new("trailer.mp4"))?;
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Scanning a video for its most dynamic window.
    Scan,
    /// Cutting clips out of their sources.
    ClipExtraction,
    /// Concatenating clips into one file.
    Combining,
}

/// Lifecycle of a single scan.
///
/// `Idle → Partitioning → Scanning → Aggregating → Done`, with `Failed`
/// reachable from every non-terminal phase. `Done` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Nothing has started yet.
    Idle,
    /// Reading metadata and computing partitions.
    Partitioning,
    /// Workers are decoding and scanning their partitions.
    Scanning,
    /// All workers joined; picking the global result.
    Aggregating,
    /// A result was produced.
    Done,
    /// The scan ended with an error.
    Failed,
}

impl ScanPhase {
    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanPhase::Done | ScanPhase::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Partitioning)
            | (Partitioning, Scanning)
            | (Scanning, Aggregating)
            | (Aggregating, Done) => true,
            _ => false,
        }
    }
}

impl Display for ScanPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Partitioning => "partitioning",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Aggregating => "aggregating",
            ScanPhase::Done => "done",
            ScanPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress counter owned by one scan worker.
///
/// Only the worker scanning `partition_id` increments `frames_processed`;
/// everyone else reads it through [`snapshot`](WorkerProgress::snapshot).
#[derive(Debug)]
pub struct WorkerProgress {
    partition_id: usize,
    frames_total: u64,
    frames_processed: AtomicU64,
}

impl WorkerProgress {
    /// Create a record for a worker expected to decode `frames_total` frames.
    pub fn new(partition_id: usize, frames_total: u64) -> Self {
        Self {
            partition_id,
            frames_total,
            frames_processed: AtomicU64::new(0),
        }
    }

    /// Count one decoded frame. Called by the owning worker only.
    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current counter value.
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            partition_id: self.partition_id,
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_total: self.frames_total,
        }
    }
}

/// A point-in-time copy of one worker's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSnapshot {
    /// Partition the worker scans.
    pub partition_id: usize,
    /// Frames decoded so far.
    pub frames_processed: u64,
    /// Frames the worker expects to decode.
    pub frames_total: u64,
}

/// A snapshot of operation progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation the snapshot belongs to.
    pub operation: OperationType,
    /// Scan lifecycle phase. Other operations report `Scanning` while busy
    /// and `Done` on their final report.
    pub phase: ScanPhase,
    /// How many items (frames / clips) have been processed so far.
    pub current: u64,
    /// Items expected in total, when known.
    pub total: Option<u64>,
    /// `current / total` as a percentage in `0.0..=100.0`.
    pub percentage: Option<f32>,
    /// Time since the operation started.
    pub elapsed: Duration,
    /// Remaining time extrapolated from the rate so far.
    pub estimated_remaining: Option<Duration>,
    /// Per-worker counters. Empty for operations without workers.
    pub workers: Vec<WorkerSnapshot>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks are
/// invoked from the reporter thread while workers run.
///
/// A callback cannot fail and cannot stop the work it observes; stopping is
/// the job of a [`CancellationToken`].
pub trait ProgressCallback: Send + Sync {
    /// Receive one snapshot.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation. Scan workers check it before every frame.
///
/// # Example
///
/// ```
/// use peakclip::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not fired.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fire the token. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// `true` once any clone has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a [`ProgressInfo`] from counters and timing.
pub(crate) fn progress_info(
    operation: OperationType,
    phase: ScanPhase,
    current: u64,
    total: Option<u64>,
    elapsed: Duration,
    workers: Vec<WorkerSnapshot>,
) -> ProgressInfo {
    let percentage = total
        .filter(|&t| t > 0)
        .map(|t| (current as f32 / t as f32) * 100.0);

    let estimated_remaining = if current > 0 {
        total.map(|t| {
            let remaining = t.saturating_sub(current);
            elapsed.mul_f64(remaining as f64 / current as f64)
        })
    } else {
        None
    };

    ProgressInfo {
        operation,
        phase,
        current,
        total,
        percentage,
        elapsed,
        estimated_remaining,
        workers,
    }
}

/// Sum a set of worker records into a single scan report.
pub(crate) fn scan_report(
    phase: ScanPhase,
    workers: &[WorkerProgress],
    start_time: Instant,
) -> ProgressInfo {
    let snapshots: Vec<WorkerSnapshot> = workers.iter().map(WorkerProgress::snapshot).collect();
    let current = snapshots.iter().map(|s| s.frames_processed).sum();
    let total = snapshots.iter().map(|s| s.frames_total).sum();
    progress_info(
        OperationType::Scan,
        phase,
        current,
        Some(total),
        start_time.elapsed(),
        snapshots,
    )
}

/// Sequential progress tracker for single-threaded operations.
pub(crate) struct ProgressTracker {
    callback: Option<Arc<dyn ProgressCallback>>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Option<Arc<dyn ProgressCallback>>,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one completed item and report.
    pub(crate) fn advance(&mut self) {
        self.current += 1;
        self.report(ScanPhase::Scanning);
    }

    /// Emit the final report.
    pub(crate) fn finish(&mut self) {
        self.report(ScanPhase::Done);
    }

    fn report(&self, phase: ScanPhase) {
        if let Some(callback) = &self.callback {
            let info = progress_info(
                self.operation,
                phase,
                self.current,
                self.total,
                self.start_time.elapsed(),
                Vec::new(),
            );
            callback.on_progress(&info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        let path = [
            ScanPhase::Idle,
            ScanPhase::Partitioning,
            ScanPhase::Scanning,
            ScanPhase::Aggregating,
            ScanPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_phases_are_final() {
        for next in [ScanPhase::Idle, ScanPhase::Scanning, ScanPhase::Failed, ScanPhase::Done] {
            assert!(!ScanPhase::Done.can_transition_to(next));
            assert!(!ScanPhase::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn failure_reachable_from_running_phases() {
        for from in [
            ScanPhase::Idle,
            ScanPhase::Partitioning,
            ScanPhase::Scanning,
            ScanPhase::Aggregating,
        ] {
            assert!(from.can_transition_to(ScanPhase::Failed));
        }
    }

    #[test]
    fn skipping_phases_is_rejected() {
        assert!(!ScanPhase::Idle.can_transition_to(ScanPhase::Scanning));
        assert!(!ScanPhase::Partitioning.can_transition_to(ScanPhase::Done));
        assert!(!ScanPhase::Scanning.can_transition_to(ScanPhase::Partitioning));
    }

    #[test]
    fn worker_counter_is_monotonic() {
        let worker = WorkerProgress::new(2, 10);
        let mut last = 0;
        for _ in 0..10 {
            worker.record_frame();
            let snapshot = worker.snapshot();
            assert!(snapshot.frames_processed > last);
            last = snapshot.frames_processed;
        }
        assert_eq!(worker.snapshot().partition_id, 2);
        assert_eq!(worker.snapshot().frames_total, 10);
    }

    #[test]
    fn scan_report_sums_workers() {
        let workers = [WorkerProgress::new(0, 50), WorkerProgress::new(1, 50)];
        for _ in 0..10 {
            workers[0].record_frame();
        }
        for _ in 0..15 {
            workers[1].record_frame();
        }

        let info = scan_report(ScanPhase::Scanning, &workers, Instant::now());
        assert_eq!(info.current, 25);
        assert_eq!(info.total, Some(100));
        assert_eq!(info.percentage, Some(25.0));
        assert_eq!(info.workers.len(), 2);
        assert_eq!(info.operation, OperationType::Scan);
    }

    #[test]
    fn percentage_absent_without_total() {
        let info = progress_info(
            OperationType::Combining,
            ScanPhase::Scanning,
            3,
            None,
            Duration::from_secs(1),
            Vec::new(),
        );
        assert_eq!(info.percentage, None);
        assert_eq!(info.estimated_remaining, None);
    }

    #[test]
    fn remaining_time_scales_with_throughput() {
        let info = progress_info(
            OperationType::Scan,
            ScanPhase::Scanning,
            25,
            Some(100),
            Duration::from_secs(10),
            Vec::new(),
        );
        assert_eq!(info.estimated_remaining, Some(Duration::from_secs(30)));
    }
}
