//! Packed pixel buffers.

use crate::error::{FrameShape, PeakclipError};

/// A decoded video frame as a tightly packed pixel buffer.
///
/// Rows are stored top to bottom without padding, each pixel holding
/// `channels` interleaved 8-bit samples. Every frame yielded by one reader
/// has the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PeakclipError::InvalidFrame`] if `channels` is zero or the
    /// buffer length is not `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, PeakclipError> {
        if channels == 0 {
            return Err(PeakclipError::InvalidFrame(
                "channel count must be at least 1".to_string(),
            ));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PeakclipError::InvalidFrame(format!(
                "{width}x{height}x{channels} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Self {
        let channels = channels.max(1);
        Self {
            width,
            height,
            channels,
            data: vec![value; width as usize * height as usize * channels as usize],
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved samples per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// `(width, height, channels)`.
    pub fn shape(&self) -> FrameShape {
        (self.width, self.height, self.channels)
    }

    /// The raw samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its samples.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
