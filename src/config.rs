//! Scan and decode configuration.
//!
//! [`ScanOptions`] is a builder that threads the window length, worker
//! count, partition overlap, progress callback, cancellation token and
//! worker time limit through [`PeakScanner`](crate::PeakScanner) without
//! polluting every signature. [`FrameOutputOptions`] controls how the FFmpeg
//! source converts decoded frames before they reach the variation metric.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use peakclip::{CancellationToken, PartitionOverlap, ProgressCallback, ProgressInfo, ScanOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}: {} frames", info.phase, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ScanOptions::new()
//!     .with_window(Duration::from_secs(10))
//!     .with_threads(8)
//!     .with_overlap(PartitionOverlap::Window)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::partition::PartitionOverlap;
use crate::progress::{CancellationToken, ProgressCallback};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Default interval between progress snapshots.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Pixel layout of frames handed to the variation metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB, three samples per pixel. This is the default.
    #[default]
    Rgb8,
    /// 8-bit luma only. A third of the work, blind to pure colour changes.
    Gray8,
}

impl PixelFormat {
    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    /// Samples per pixel.
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Frame conversion settings for the FFmpeg source.
///
/// When no dimensions are set the source resolution is used. Setting one
/// dimension together with
/// [`maintain_aspect_ratio`](FrameOutputOptions::maintain_aspect_ratio)
/// computes the other automatically. Downscaling speeds up the metric
/// considerably and rarely changes which window wins.
#[derive(Debug, Clone)]
pub struct FrameOutputOptions {
    /// Layout of the converted frames.
    pub pixel_format: PixelFormat,
    /// Width after scaling, or the decoded width when unset.
    pub width: Option<u32>,
    /// Height after scaling, or the decoded height when unset.
    pub height: Option<u32>,
    /// Derive the missing dimension from the decoded aspect ratio when only
    /// one of `width` and `height` is set.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// Convert frames to `format` before measuring them.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Scale frames to `width` x `height`; `None` leaves that side to the
    /// source or to the aspect ratio.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Toggle aspect-ratio preservation for single-dimension scaling.
    #[must_use]
    pub fn with_maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.maintain_aspect_ratio = maintain;
        self
    }

    /// `(width, height)` of converted frames for a `source_width` x
    /// `source_height` stream.
    pub(crate) fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        let keep_ratio = self.maintain_aspect_ratio;
        match (self.width, self.height) {
            (Some(width), None) if keep_ratio && source_width > 0 => {
                (width, rescale(source_height, width, source_width))
            }
            (None, Some(height)) if keep_ratio && source_height > 0 => {
                (rescale(source_width, height, source_height), height)
            }
            (width, height) => (
                width.unwrap_or(source_width),
                height.unwrap_or(source_height),
            ),
        }
    }
}

/// `value * numerator / denominator`, rounded, never below one pixel.
fn rescale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = u64::from(value) * u64::from(numerator);
    let rounded = (scaled + u64::from(denominator) / 2) / u64::from(denominator);
    u32::try_from(rounded).unwrap_or(u32::MAX).max(1)
}

/// Settings for a [`PeakScanner`](crate::PeakScanner).
///
/// All fields have sensible defaults: a 10 second window, one worker per
/// available core, disjoint partitions, no progress callback, no
/// cancellation and no worker time limit.
#[derive(Clone)]
pub struct ScanOptions {
    pub(crate) window: Duration,
    pub(crate) threads: usize,
    pub(crate) overlap: PartitionOverlap,
    pub(crate) progress: Option<Arc<dyn ProgressCallback>>,
    pub(crate) report_interval: Duration,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) worker_timeout: Option<Duration>,
}

impl Debug for ScanOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanOptions")
            .field("window", &self.window)
            .field("threads", &self.threads)
            .field("overlap", &self.overlap)
            .field("has_progress", &self.progress.is_some())
            .field("report_interval", &self.report_interval)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("worker_timeout", &self.worker_timeout)
            .finish()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            threads: default_threads(),
            overlap: PartitionOverlap::Disjoint,
            progress: None,
            report_interval: DEFAULT_REPORT_INTERVAL,
            cancellation: None,
            worker_timeout: None,
        }
    }

    /// Set the window duration.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the number of workers, which is also the number of partitions.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Choose how partitions handle windows that cross their boundaries.
    #[must_use]
    pub fn with_overlap(mut self, overlap: PartitionOverlap) -> Self {
        self.overlap = overlap;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set how often the reporter samples worker counters.
    ///
    /// Clamped to a minimum of one millisecond.
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, workers stop at the next frame, release
    /// their readers, and the scan returns
    /// [`PeakclipError::Cancelled`](crate::PeakclipError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Bound the wall-clock time of each worker.
    ///
    /// The limit is checked between frames; a worker that exceeds it fails
    /// its own partition only. It does not interrupt a blocked decode call:
    /// a reader stuck inside a single `next_frame` is noticed only once that
    /// call returns.
    #[must_use]
    pub fn with_worker_timeout(mut self, limit: Duration) -> Self {
        self.worker_timeout = Some(limit);
        self
    }

    /// The configured window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The configured worker count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The configured partition overlap mode.
    pub fn overlap(&self) -> PartitionOverlap {
        self.overlap
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
}
