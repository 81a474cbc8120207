//! Error types for the `peakclip` crate.
//!
//! This module defines [`PeakclipError`], the unified error type returned by
//! all fallible operations in the crate. Decode-level variants are normally
//! caught at the worker boundary of a scan and turned into a failed
//! partition; only the scan-level variants reach the caller of
//! [`PeakScanner::scan`](crate::PeakScanner::scan).

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// Width, height and channel count of a frame, used in mismatch reports.
pub type FrameShape = (u32, u32, u8);

/// The unified error type for all `peakclip` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PeakclipError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the frame source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecode(String),

    /// Two frames handed to the variation metric differ in shape.
    #[error(
        "Frame dimensions differ: expected {}x{}x{}, found {}x{}x{}",
        expected.0, expected.1, expected.2, found.0, found.1, found.2
    )]
    DimensionMismatch {
        /// Shape of the earlier frame.
        expected: FrameShape,
        /// Shape of the offending frame.
        found: FrameShape,
    },

    /// A pixel buffer does not match the dimensions it was declared with.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The requested window does not cover at least one frame.
    #[error("Invalid window: {window:?} at {frames_per_second} fps covers no frames")]
    InvalidWindow {
        /// Requested window duration.
        window: Duration,
        /// Frame rate of the video being scanned.
        frames_per_second: f64,
    },

    /// A scan or pipeline setting is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The video is too short for a single complete window, so there is
    /// no candidate to report.
    #[error("No complete {window_frames}-frame window in {total_frames} frames")]
    NoCandidateWindow {
        /// Total frames in the video.
        total_frames: u64,
        /// Window length in frames.
        window_frames: u64,
    },

    /// Every partition either failed or reported zero variation.
    #[error("No usable signal: all {partitions} partitions reported zero variation ({failed} failed)")]
    AllPartitionsFailed {
        /// Number of partitions in the scan.
        partitions: usize,
        /// How many of them failed outright.
        failed: usize,
    },

    /// A worker exceeded its wall-clock budget.
    #[error("Worker for partition {partition_id} exceeded its time limit of {limit:?}")]
    WorkerTimedOut {
        /// Partition the worker was scanning.
        partition_id: usize,
        /// The configured limit.
        limit: Duration,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// A clip could not be cut from its source.
    #[error("Failed to extract clip from {path}: {reason}")]
    ClipExtraction {
        /// Source media file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An output file exists and overwriting was not allowed.
    #[error("Output already exists: {}", path.display())]
    OutputExists {
        /// The existing file.
        path: PathBuf,
    },

    /// Clips could not be concatenated.
    #[error("Failed to combine clips: {0}")]
    Combine(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for PeakclipError {
    fn from(error: FfmpegError) -> Self {
        PeakclipError::Ffmpeg(error.to_string())
    }
}
