//! Frame-to-frame variation metric.
//!
//! The variation between two frames is the sum of absolute sample
//! differences. Samples are widened to `i16` before subtracting and summed in
//! `u64`, so neither the per-sample difference nor the frame total can
//! overflow for any realistic frame size.

use crate::error::PeakclipError;
use crate::frame::Frame;

/// Aggregate absolute pixel difference between two frames.
pub type Variation = u64;

/// Compute the variation between two frames of identical shape.
///
/// # Errors
///
/// Returns [`PeakclipError::DimensionMismatch`] if the frames differ in
/// width, height or channel count.
///
/// # Example
///
/// ```
/// use peakclip::{Frame, frame_variation};
///
/// let dark = Frame::filled(2, 2, 3, 10);
/// let bright = Frame::filled(2, 2, 3, 250);
/// assert_eq!(frame_variation(&dark, &bright)?, 12 * 240);
/// # Ok::<(), peakclip::PeakclipError>(())
/// ```
pub fn frame_variation(previous: &Frame, current: &Frame) -> Result<Variation, PeakclipError> {
    if previous.shape() != current.shape() {
        return Err(PeakclipError::DimensionMismatch {
            expected: previous.shape(),
            found: current.shape(),
        });
    }

    Ok(sample_variation(previous.data(), current.data()))
}

/// Sum of `|a - b|` over two equally long sample slices.
pub(crate) fn sample_variation(previous: &[u8], current: &[u8]) -> Variation {
    // Chunked so the inner sum stays in u32 and vectorises; 4096 * 255 fits.
    previous
        .chunks(4096)
        .zip(current.chunks(4096))
        .map(|(a, b)| {
            a.iter()
                .zip(b)
                .map(|(&x, &y)| (i16::from(x) - i16::from(y)).unsigned_abs() as u32)
                .sum::<u32>() as Variation
        })
        .sum()
}
