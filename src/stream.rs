//! Async scanning on top of the blocking scanner.
//!
//! A scan is CPU-bound and already runs on its own rayon pool, so the async
//! API only moves the blocking call onto `tokio::task::spawn_blocking` and
//! hands back a [`ScanFuture`]. Progress can be consumed as a channel with
//! [`ChannelProgress`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use peakclip::{ChannelProgress, FfmpegSource, PeakScanner, ScanOptions};
//!
//! # async fn example() -> Result<(), peakclip::PeakclipError> {
//! let (progress, mut updates) = ChannelProgress::new();
//! let scanner = PeakScanner::new(ScanOptions::new().with_progress(Arc::new(progress)));
//! let scan = scanner.scan_async(FfmpegSource::new("input.mp4"));
//!
//! tokio::spawn(async move {
//!     while let Some(info) = updates.recv().await {
//!         println!("{} / {:?} frames", info.current, info.total);
//!     }
//! });
//!
//! let result = scan.await?;
//! println!("window starts at frame {}", result.window_start);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::coordinator::{PeakScanner, ScanResult};
use crate::error::PeakclipError;
use crate::ffmpeg_source::FfmpegSource;
use crate::progress::{ProgressCallback, ProgressInfo};
use crate::source::MediaSource;

/// A scan running on a blocking thread.
///
/// Dropping the future does not stop the scan; use a
/// [`CancellationToken`](crate::CancellationToken) for that. If the blocking
/// task panics or is aborted the future resolves to
/// [`PeakclipError::Cancelled`].
pub struct ScanFuture {
    handle: JoinHandle<Result<ScanResult, PeakclipError>>,
}

impl Future for ScanFuture {
    type Output = Result<ScanResult, PeakclipError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(PeakclipError::Cancelled)))
    }
}

impl PeakScanner {
    /// Run [`scan`](PeakScanner::scan) on Tokio's blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn scan_async<S>(&self, source: S) -> ScanFuture
    where
        S: MediaSource + Send + 'static,
    {
        let scanner = self.clone();
        ScanFuture {
            handle: tokio::task::spawn_blocking(move || scanner.scan(&source)),
        }
    }

    /// Scan the file at `path` asynchronously with default frame output.
    pub fn scan_file_async<P: AsRef<Path>>(&self, path: P) -> ScanFuture {
        self.scan_async(FfmpegSource::new(path))
    }
}

/// A [`ProgressCallback`] that forwards every snapshot into a Tokio channel.
///
/// Snapshots sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: UnboundedSender<ProgressInfo>,
}

impl ChannelProgress {
    /// Create the callback and the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<ProgressInfo>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let _ = self.sender.send(info.clone());
    }
}
