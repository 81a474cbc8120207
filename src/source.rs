//! Frame source abstraction.
//!
//! A [`MediaSource`] is a shareable description of one video (a path, or a
//! set of in-memory frames). Every scan worker calls
//! [`open`](MediaSource::open) to get its own [`FrameReader`], so no decoder
//! state or frame buffer is ever shared between workers. Dropping a reader
//! closes it; this happens on every exit path of a worker, including errors
//! and cancellation.
//!
//! [`FfmpegSource`](crate::FfmpegSource) decodes real files.
//! [`MemorySource`] serves pre-decoded frames.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::error::PeakclipError;
use crate::frame::Frame;
use crate::metadata::VideoMetadata;

/// A video that can be opened once per worker.
pub trait MediaSource: Sync {
    /// Reader type produced by [`open`](MediaSource::open).
    type Reader: FrameReader;

    /// Open an independent reader positioned at the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`PeakclipError::FileOpen`] (or another I/O-level error) if the
    /// underlying media cannot be opened.
    fn open(&self) -> Result<Self::Reader, PeakclipError>;
}

/// An open, exclusively owned decode cursor over one video.
pub trait FrameReader {
    /// Metadata read when the reader was opened.
    fn metadata(&self) -> &VideoMetadata;

    /// Position the reader so that the next frame returned is
    /// `frame_index` (within the reader's seek tolerance).
    fn decode_from(&mut self, frame_index: u64) -> Result<(), PeakclipError>;

    /// Return the next frame with its index, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<(u64, Frame)>, PeakclipError>;
}

/// A source over frames already held in memory.
///
/// Cloning is cheap; clones share the frames and the open-reader count.
///
/// # Example
///
/// ```
/// use peakclip::{Frame, FrameReader, MediaSource, MemorySource};
///
/// let frames = (0..10).map(|value| Frame::filled(4, 4, 1, value)).collect();
/// let source = MemorySource::new(24.0, frames)?;
///
/// let mut reader = source.open()?;
/// reader.decode_from(7)?;
/// assert_eq!(reader.next_frame()?.map(|(index, _)| index), Some(7));
/// assert_eq!(source.open_readers(), 1);
///
/// drop(reader);
/// assert_eq!(source.open_readers(), 0);
/// # Ok::<(), peakclip::PeakclipError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    metadata: VideoMetadata,
    frames: Arc<Vec<Frame>>,
    open_readers: Arc<AtomicUsize>,
}

impl MemorySource {
    /// Wrap a sequence of frames played at `frames_per_second`.
    ///
    /// # Errors
    ///
    /// Returns [`PeakclipError::DimensionMismatch`] if the frames do not all
    /// share one shape, or [`PeakclipError::InvalidConfiguration`] if the
    /// frame rate is not positive.
    pub fn new(frames_per_second: f64, frames: Vec<Frame>) -> Result<Self, PeakclipError> {
        if !(frames_per_second > 0.0) {
            return Err(PeakclipError::InvalidConfiguration(format!(
                "frame rate must be positive, got {frames_per_second}"
            )));
        }

        let shape = frames.first().map(Frame::shape).unwrap_or((0, 0, 1));
        if let Some(odd) = frames.iter().find(|frame| frame.shape() != shape) {
            return Err(PeakclipError::DimensionMismatch {
                expected: shape,
                found: odd.shape(),
            });
        }

        Ok(Self {
            metadata: VideoMetadata {
                width: shape.0,
                height: shape.1,
                frames_per_second,
                frame_count: frames.len() as u64,
                codec: "raw".to_string(),
            },
            frames: Arc::new(frames),
            open_readers: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of readers currently open.
    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    /// The frames this source serves.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl MediaSource for MemorySource {
    type Reader = MemoryReader;

    fn open(&self) -> Result<MemoryReader, PeakclipError> {
        self.open_readers.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryReader {
            metadata: self.metadata.clone(),
            frames: Arc::clone(&self.frames),
            position: 0,
            open_readers: Arc::clone(&self.open_readers),
        })
    }
}

/// Reader produced by [`MemorySource`]. Seeking is exact.
#[derive(Debug)]
pub struct MemoryReader {
    metadata: VideoMetadata,
    frames: Arc<Vec<Frame>>,
    position: usize,
    open_readers: Arc<AtomicUsize>,
}

impl FrameReader for MemoryReader {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_from(&mut self, frame_index: u64) -> Result<(), PeakclipError> {
        self.position = usize::try_from(frame_index)
            .unwrap_or(usize::MAX)
            .min(self.frames.len());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<(u64, Frame)>, PeakclipError> {
        let Some(frame) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let index = self.position as u64;
        self.position += 1;
        Ok(Some((index, frame.clone())))
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.open_readers.fetch_sub(1, Ordering::SeqCst);
    }
}
