//! VideoMetadata conversion tests.

use std::time::Duration;

use peakclip::VideoMetadata;

fn metadata(frames_per_second: f64, frame_count: u64) -> VideoMetadata {
    VideoMetadata {
        width: 4,
        height: 4,
        frames_per_second,
        frame_count,
        codec: "raw".to_string(),
    }
}

#[test]
fn window_frames_from_whole_fps() {
    assert_eq!(metadata(24.0, 0).frames_in(Duration::from_secs(10)), 240);
}

#[test]
fn window_frames_round_ntsc_rates() {
    assert_eq!(metadata(23.976, 0).frames_in(Duration::from_secs(10)), 240);
    assert_eq!(metadata(29.97, 0).frames_in(Duration::from_secs(10)), 300);
}

#[test]
fn duration_from_frame_count() {
    assert_eq!(metadata(24.0, 2400).duration(), Duration::from_secs(100));
    assert_eq!(metadata(0.0, 2400).duration(), Duration::ZERO);
}
