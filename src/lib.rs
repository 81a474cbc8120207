//! # peakclip
//!
//! Find the most visually dynamic stretch of a video and cut it out.
//!
//! `peakclip` scores every frame transition by the sum of absolute sample
//! differences between consecutive frames, then slides a fixed-length window
//! over those scores and reports the window with the largest total. The
//! video is split into contiguous partitions that are decoded and scanned in
//! parallel, each worker with its own FFmpeg decoder, via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Locate the most dynamic window
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use peakclip::{FfmpegSource, PeakScanner, ScanOptions};
//!
//! let scanner = PeakScanner::new(ScanOptions::new().with_window(Duration::from_secs(10)));
//! let result = scanner.scan(&FfmpegSource::new("trailer.mp4"))?;
//! println!(
//!     "frames {}..{} ({:.1}s in)",
//!     result.window_start,
//!     result.window_start + result.window_frames,
//!     result.start_time().as_secs_f64(),
//! );
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```
//!
//! ### Cut it out
//!
//! ```no_run
//! use std::path::Path;
//!
//! use peakclip::{ClipExtractor, FfmpegClipExtractor, FfmpegSource, PeakScanner, ScanOptions};
//!
//! let result = PeakScanner::new(ScanOptions::new()).scan(&FfmpegSource::new("trailer.mp4"))?;
//! FfmpegClipExtractor.extract(
//!     Path::new("trailer.mp4"),
//!     result.start_time(),
//!     result.window_duration(),
//!     Path::new("trailer_action.mp4"),
//! )?;
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```
//!
//! ### Scan frames you decoded yourself
//!
//! ```
//! use std::time::Duration;
//!
//! use peakclip::{Frame, MemorySource, PeakScanner, ScanOptions};
//!
//! let frames = (0..100)
//!     .map(|index| Frame::filled(8, 8, 1, if (40..60).contains(&index) && index % 2 == 0 { 255 } else { 0 }))
//!     .collect();
//! let source = MemorySource::new(10.0, frames)?;
//!
//! let options = ScanOptions::new().with_window(Duration::from_secs(1)).with_threads(2);
//! let result = PeakScanner::new(options).scan(&source)?;
//! assert_eq!(result.window_frames, 10);
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```
//!
//! ## Features
//!
//! - **Parallel scan**: one partition per worker on a dedicated rayon pool,
//!   each worker with its own decoder
//! - **O(1) window updates**: running sum over a fixed-capacity queue
//! - **Exact boundaries on request**: [`PartitionOverlap::Window`] lets
//!   windows cross partition boundaries
//! - **Degraded results**: a failed partition is logged and skipped
//! - **Progress & cancellation**: per-worker counters sampled by a reporter
//!   thread, plus a cooperative [`CancellationToken`]
//! - **Stream-copy clips**: cutting and joining without re-encoding
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`ScanFuture`] and [`ChannelProgress`] via Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod clip;
pub mod config;
mod conversion;
pub mod coordinator;
pub mod error;
pub mod ffmpeg;
pub mod ffmpeg_source;
pub mod frame;
pub mod metadata;
pub mod partition;
pub mod progress;
pub mod scanner;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod variation;

pub use clip::{
    BatchReport, ClipExtractor, ClipRecord, CombineOutcome, Combiner, FfmpegClipExtractor,
    FfmpegCombiner, Pipeline, SkippedInput, action_clip_path,
};
pub use config::{FrameOutputOptions, PixelFormat, ScanOptions};
pub use coordinator::{PartitionResult, PartitionStatus, PeakScanner, ScanResult, aggregate};
pub use error::PeakclipError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use ffmpeg_source::{FfmpegReader, FfmpegSource, SEEK_TOLERANCE_FRAMES};
pub use frame::Frame;
pub use metadata::VideoMetadata;
pub use partition::{Partition, PartitionOverlap, partition_frames};
pub use progress::{
    CancellationToken, OperationType, ProgressCallback, ProgressInfo, ScanPhase, WorkerProgress,
    WorkerSnapshot,
};
pub use scanner::{WindowCandidate, WindowScanner};
pub use source::{FrameReader, MediaSource, MemoryReader, MemorySource};
#[cfg(feature = "async")]
pub use stream::{ChannelProgress, ScanFuture};
pub use variation::{Variation, frame_variation};
