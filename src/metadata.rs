//! Video metadata types.
//!
//! [`VideoMetadata`] is read once when a [`FrameReader`](crate::FrameReader)
//! is opened and cached for the lifetime of the reader. The coordinator uses
//! it to size partitions and to convert the window duration into frames.

use std::time::Duration;

/// Metadata for a video stream.
///
/// # Example
///
/// ```no_run
/// use peakclip::{FfmpegSource, FrameReader, MediaSource};
///
/// let reader = FfmpegSource::new("trailer.mp4").open()?;
/// let metadata = reader.metadata();
/// println!("{} frames @ {:.2} fps", metadata.frame_count, metadata.frames_per_second);
/// # Ok::<(), peakclip::PeakclipError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Width in pixels of the frames the reader yields.
    pub width: u32,
    /// Height in pixels of the frames the reader yields.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Total number of frames. Taken from the container when it records one,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"vp9"`), or `"raw"` for in-memory sources.
    pub codec: String,
}

impl VideoMetadata {
    /// Playback duration implied by the frame count and frame rate.
    pub fn duration(&self) -> Duration {
        if self.frames_per_second > 0.0 {
            Duration::from_secs_f64(self.frame_count as f64 / self.frames_per_second)
        } else {
            Duration::ZERO
        }
    }

    /// Convert a window duration into a whole number of frames.
    ///
    /// Rounds to the nearest frame, so a 10 second window at 23.976 fps is
    /// 240 frames.
    pub fn frames_in(&self, window: Duration) -> u64 {
        (self.frames_per_second * window.as_secs_f64()).round().max(0.0) as u64
    }
}
