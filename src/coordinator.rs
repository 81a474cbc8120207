//! Parallel window scan.
//!
//! [`PeakScanner`] splits a video into one partition per worker, scans every
//! partition on a dedicated [`rayon`] pool, and aggregates the local results
//! once all workers have joined. Each worker opens its own reader from the
//! shared [`MediaSource`], so nothing mutable is shared except each worker's
//! own progress counter.
//!
//! A worker that cannot open, seek or decode its range does not abort the
//! scan: its partition is reported as failed with zero variation and the
//! remaining partitions decide the result. Only when no partition yields a
//! usable signal does the scan itself fail.
//!
//! # Example
//!
//! ```no_run
//! use peakclip::{FfmpegSource, PeakScanner, ScanOptions};
//!
//! let result = PeakScanner::new(ScanOptions::new().with_threads(8))
//!     .scan(&FfmpegSource::new("trailer.mp4"))?;
//! println!(
//!     "Most dynamic window starts at frame {} ({:?})",
//!     result.window_start,
//!     result.start_time(),
//! );
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```

use std::num::NonZeroU64;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::config::ScanOptions;
use crate::error::PeakclipError;
use crate::ffmpeg_source::FfmpegSource;
use crate::partition::{Partition, partition_frames};
use crate::progress::{ScanPhase, WorkerProgress, scan_report};
use crate::scanner::scan_frames;
use crate::source::{FrameReader, MediaSource};
use crate::variation::Variation;

/// Outcome of scanning one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStatus {
    /// The partition produced a complete window.
    Candidate,
    /// The partition was too short for a complete window.
    NoCandidate,
    /// The worker failed; the reason is kept for logging and reporting.
    Failed(String),
}

/// Local result of one worker.
///
/// Failed and candidate-less partitions report zero variation at the
/// partition start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResult {
    /// Partition the result belongs to.
    pub partition_id: usize,
    /// Best window sum found in the partition.
    pub max_variation: Variation,
    /// First frame of that window.
    pub window_start: u64,
    /// Whether the result is a genuine candidate.
    pub status: PartitionStatus,
    /// Frames the worker decoded.
    pub frames_processed: u64,
}

impl PartitionResult {
    fn empty(partition: &Partition, status: PartitionStatus, frames_processed: u64) -> Self {
        Self {
            partition_id: partition.id,
            max_variation: 0,
            window_start: partition.start,
            status,
            frames_processed,
        }
    }

    /// `true` if the worker failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, PartitionStatus::Failed(_))
    }
}

/// Final output of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// First frame of the most dynamic window.
    pub window_start: u64,
    /// Total frames in the video.
    pub total_frames: u64,
    /// Window length in frames.
    pub window_frames: u64,
    /// Frame rate used to convert between frames and time.
    pub frames_per_second: f64,
    /// Sum of variation over the winning window.
    pub max_variation: Variation,
    /// Partition that produced the winning window.
    pub partition_id: usize,
    /// Number of partitions that failed and were skipped.
    pub failed_partitions: usize,
}

impl ScanResult {
    /// Timestamp of the window's first frame.
    pub fn start_time(&self) -> Duration {
        Duration::from_secs_f64(self.window_start as f64 / self.frames_per_second)
    }

    /// Duration covered by the window.
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs_f64(self.window_frames as f64 / self.frames_per_second)
    }

    /// `true` if some partitions failed and the result rests on the rest.
    pub fn is_degraded(&self) -> bool {
        self.failed_partitions > 0
    }
}

/// Runs the parallel moving-window scan.
#[derive(Debug, Clone, Default)]
pub struct PeakScanner {
    options: ScanOptions,
}

impl PeakScanner {
    /// Create a scanner with the given options.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// The scanner's options.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Find the most dynamic window of `source`.
    ///
    /// # Errors
    ///
    /// - [`PeakclipError::FileOpen`] if the source cannot be opened to read
    ///   its metadata.
    /// - [`PeakclipError::InvalidWindow`] if the window covers no frames.
    /// - [`PeakclipError::NoCandidateWindow`] if no partition holds a
    ///   complete window.
    /// - [`PeakclipError::AllPartitionsFailed`] if every partition failed or
    ///   reported zero variation.
    /// - [`PeakclipError::Cancelled`] if the cancellation token fired.
    pub fn scan<S: MediaSource>(&self, source: &S) -> Result<ScanResult, PeakclipError> {
        let mut phase = ScanPhase::Idle;
        let outcome = self.run(source, &mut phase);
        if outcome.is_err() {
            transition(&mut phase, ScanPhase::Failed);
        }
        outcome
    }

    /// Scan the file at `path` with default frame conversion.
    pub fn scan_file<P: AsRef<Path>>(&self, path: P) -> Result<ScanResult, PeakclipError> {
        self.scan(&FfmpegSource::new(path))
    }

    fn run<S: MediaSource>(
        &self,
        source: &S,
        phase: &mut ScanPhase,
    ) -> Result<ScanResult, PeakclipError> {
        let start_time = Instant::now();
        transition(phase, ScanPhase::Partitioning);

        let metadata = {
            let reader = source.open()?;
            reader.metadata().clone()
        };

        let window_frames = NonZeroU64::new(metadata.frames_in(self.options.window)).ok_or(
            PeakclipError::InvalidWindow {
                window: self.options.window,
                frames_per_second: metadata.frames_per_second,
            },
        )?;
        let total_frames = metadata.frame_count;

        log::info!(
            "Scanning {} frames @ {:.3} fps for a {}-frame window ({} workers, {:?})",
            total_frames,
            metadata.frames_per_second,
            window_frames,
            self.options.threads,
            self.options.overlap,
        );

        let partitions = partition_frames(
            total_frames,
            self.options.threads,
            window_frames.get(),
            self.options.overlap,
        );

        transition(phase, ScanPhase::Scanning);
        let results = self.scan_partitions(source, &partitions, window_frames, start_time)?;

        if self.options.is_cancelled() {
            return Err(PeakclipError::Cancelled);
        }

        transition(phase, ScanPhase::Aggregating);
        let result = aggregate(
            &results,
            total_frames,
            window_frames.get(),
            metadata.frames_per_second,
        )?;

        log::info!(
            "Best window starts at frame {} (variation {}, partition {}, {} failed)",
            result.window_start,
            result.max_variation,
            result.partition_id,
            result.failed_partitions,
        );
        transition(phase, ScanPhase::Done);
        Ok(result)
    }

    /// Scan every partition on a fixed-size pool and join.
    fn scan_partitions<S: MediaSource>(
        &self,
        source: &S,
        partitions: &[Partition],
        window_frames: NonZeroU64,
        start_time: Instant,
    ) -> Result<Vec<PartitionResult>, PeakclipError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .thread_name(|index| format!("peakclip-worker-{index}"))
            .build()
            .map_err(|error| PeakclipError::ThreadPool(error.to_string()))?;

        let workers: Vec<WorkerProgress> = partitions
            .iter()
            .map(|partition| WorkerProgress::new(partition.id, partition.scan_len()))
            .collect();

        let results = thread::scope(|scope| {
            let (done_sender, done_receiver) = mpsc::channel::<()>();

            if let Some(callback) = &self.options.progress {
                let interval = self.options.report_interval;
                let workers = &workers;
                scope.spawn(move || {
                    loop {
                        match done_receiver.recv_timeout(interval) {
                            Err(RecvTimeoutError::Timeout) => callback
                                .on_progress(&scan_report(ScanPhase::Scanning, workers, start_time)),
                            _ => break,
                        }
                    }
                    callback.on_progress(&scan_report(ScanPhase::Aggregating, workers, start_time));
                });
            }

            // `collect` is the barrier: it returns once every worker reported.
            let results: Vec<PartitionResult> = pool.install(|| {
                partitions
                    .par_iter()
                    .zip(workers.par_iter())
                    .map(|(partition, progress)| {
                        self.scan_one(source, partition, window_frames, progress)
                    })
                    .collect()
            });

            drop(done_sender);
            results
        });

        Ok(results)
    }

    /// Worker body. Never fails: errors become a failed partition.
    fn scan_one<S: MediaSource>(
        &self,
        source: &S,
        partition: &Partition,
        window_frames: NonZeroU64,
        progress: &WorkerProgress,
    ) -> PartitionResult {
        if !partition.fits_window(window_frames.get()) {
            log::debug!(
                "Partition {} ({:?}) is shorter than one window",
                partition.id,
                partition.scan_range(),
            );
            return PartitionResult::empty(partition, PartitionStatus::NoCandidate, 0);
        }

        let started = Instant::now();
        let cancellation = self.options.cancellation.as_ref();
        let limit = self.options.worker_timeout;
        let interrupt_check = || -> Result<(), PeakclipError> {
            if cancellation.is_some_and(|token| token.is_cancelled()) {
                return Err(PeakclipError::Cancelled);
            }
            if let Some(limit) = limit
                && started.elapsed() > limit
            {
                return Err(PeakclipError::WorkerTimedOut {
                    partition_id: partition.id,
                    limit,
                });
            }
            Ok(())
        };

        // The reader is dropped, and so closed, before this function returns.
        let outcome = source.open().and_then(|mut reader| {
            scan_frames(&mut reader, partition, window_frames, progress, &interrupt_check)
        });
        let frames_processed = progress.snapshot().frames_processed;

        match outcome {
            Ok(Some(candidate)) => {
                log::debug!(
                    "Partition {} best window at {} (variation {})",
                    partition.id,
                    candidate.start,
                    candidate.variation,
                );
                PartitionResult {
                    partition_id: partition.id,
                    max_variation: candidate.variation,
                    window_start: candidate.start,
                    status: PartitionStatus::Candidate,
                    frames_processed,
                }
            }
            Ok(None) => {
                PartitionResult::empty(partition, PartitionStatus::NoCandidate, frames_processed)
            }
            Err(PeakclipError::Cancelled) => PartitionResult::empty(
                partition,
                PartitionStatus::Failed("cancelled".to_string()),
                frames_processed,
            ),
            Err(error) => {
                log::warn!(
                    "Partition {} ({:?}) failed, continuing without it: {error}",
                    partition.id,
                    partition.scan_range(),
                );
                PartitionResult::empty(
                    partition,
                    PartitionStatus::Failed(error.to_string()),
                    frames_processed,
                )
            }
        }
    }
}

/// Pick the global result from per-partition results.
///
/// The candidate with the largest variation wins; ties go to the lowest
/// partition id, and within a partition the scanner already kept the
/// earliest window.
///
/// # Errors
///
/// - [`PeakclipError::AllPartitionsFailed`] if no candidate has non-zero
///   variation and at least one partition failed, or if candidates exist but
///   all of them are zero.
/// - [`PeakclipError::NoCandidateWindow`] if no partition produced a
///   candidate and none failed.
pub fn aggregate(
    results: &[PartitionResult],
    total_frames: u64,
    window_frames: u64,
    frames_per_second: f64,
) -> Result<ScanResult, PeakclipError> {
    let failed = results.iter().filter(|result| result.is_failed()).count();

    let mut ordered: Vec<&PartitionResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.partition_id);

    let mut best: Option<&PartitionResult> = None;
    for result in ordered {
        if result.status != PartitionStatus::Candidate {
            continue;
        }
        if best.is_none_or(|current| result.max_variation > current.max_variation) {
            best = Some(result);
        }
    }

    match best {
        Some(best) if best.max_variation > 0 => Ok(ScanResult {
            window_start: best.window_start,
            total_frames,
            window_frames,
            frames_per_second,
            max_variation: best.max_variation,
            partition_id: best.partition_id,
            failed_partitions: failed,
        }),
        None if failed == 0 => Err(PeakclipError::NoCandidateWindow {
            total_frames,
            window_frames,
        }),
        _ => Err(PeakclipError::AllPartitionsFailed {
            partitions: results.len(),
            failed,
        }),
    }
}

fn transition(phase: &mut ScanPhase, next: ScanPhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "invalid scan transition {phase} -> {next}"
    );
    log::debug!("Scan phase {phase} -> {next}");
    *phase = next;
}
