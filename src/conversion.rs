//! Timestamp and pixel-buffer helpers shared by the FFmpeg-backed modules.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy the first plane of a packed video frame into a tightly packed buffer.
///
/// FFmpeg pads rows to its alignment; the padding is dropped here.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let rows = height as usize;
    let data = video_frame.data(0);

    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in data.chunks(stride).take(rows) {
        buffer.extend_from_slice(&row[..row_bytes]);
    }
    buffer
}

/// Seconds represented by `timestamp` in `time_base`.
pub(crate) fn timestamp_to_seconds(timestamp: i64, time_base: Rational) -> f64 {
    timestamp as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Frame index of a decoded timestamp.
///
/// `start_timestamp` is the stream's first timestamp, so streams that do not
/// start at zero still number their first frame 0. Rounding to the nearest
/// frame absorbs timestamp jitter from the container.
pub(crate) fn timestamp_to_frame_index(
    timestamp: i64,
    start_timestamp: i64,
    time_base: Rational,
    frames_per_second: f64,
) -> u64 {
    let seconds = timestamp_to_seconds(timestamp - start_timestamp, time_base);
    (seconds * frames_per_second).round().max(0.0) as u64
}

/// Container seek target for `frame_index`, in `AV_TIME_BASE` microseconds.
///
/// `Input::seek` seeks across all streams and so expects microseconds
/// rather than a stream time base.
pub(crate) fn frame_index_to_seek_timestamp(
    frame_index: u64,
    frames_per_second: f64,
    start_microseconds: i64,
) -> i64 {
    let seconds = frame_index as f64 / frames_per_second;
    start_microseconds + (seconds * 1_000_000.0) as i64
}

/// Convert a duration to a timestamp in `time_base`.
pub(crate) fn duration_to_timestamp(duration: Duration, time_base: Rational) -> i64 {
    let seconds = duration.as_secs_f64();
    (seconds * time_base.denominator() as f64 / time_base.numerator() as f64).round() as i64
}

/// Microseconds for `seconds`, used for container-level seeks.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds * 1_000_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_map_to_nearest_frame() {
        let time_base = Rational::new(1, 12_800);
        // 24 fps in a 1/12800 time base: one frame every 533.33 ticks.
        assert_eq!(timestamp_to_frame_index(0, 0, time_base, 24.0), 0);
        assert_eq!(timestamp_to_frame_index(533, 0, time_base, 24.0), 1);
        assert_eq!(timestamp_to_frame_index(534, 0, time_base, 24.0), 1);
        assert_eq!(timestamp_to_frame_index(12_800 * 10, 0, time_base, 24.0), 240);
    }

    #[test]
    fn start_offset_is_removed() {
        let time_base = Rational::new(1, 90_000);
        let start = 90_000;
        assert_eq!(timestamp_to_frame_index(start, start, time_base, 30.0), 0);
        assert_eq!(timestamp_to_frame_index(start + 3_000, start, time_base, 30.0), 1);
        assert_eq!(timestamp_to_frame_index(start - 3_000, start, time_base, 30.0), 0);
    }

    #[test]
    fn seek_timestamp_is_in_microseconds() {
        assert_eq!(frame_index_to_seek_timestamp(48, 24.0, 0), 2_000_000);
        assert_eq!(frame_index_to_seek_timestamp(0, 24.0, 500), 500);
        assert_eq!(seconds_to_seek_timestamp(1.5), 1_500_000);
    }

    #[test]
    fn duration_rescales_into_time_base() {
        let time_base = Rational::new(1, 1_000);
        assert_eq!(duration_to_timestamp(Duration::from_millis(2_500), time_base), 2_500);
        let ntsc = Rational::new(1001, 30_000);
        assert_eq!(duration_to_timestamp(Duration::from_secs(1), ntsc), 30);
    }

    #[test]
    fn seconds_from_timestamp() {
        let time_base = Rational::new(1, 48_000);
        assert!((timestamp_to_seconds(24_000, time_base) - 0.5).abs() < 1e-9);
    }
}
