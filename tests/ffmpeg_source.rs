//! FFmpeg frame source integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;
use std::time::Duration;

use peakclip::{
    FfmpegSource, FrameOutputOptions, FrameReader, MediaSource, PartitionOverlap, PeakScanner,
    PixelFormat, SEEK_TOLERANCE_FRAMES, ScanOptions,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn small_gray() -> FrameOutputOptions {
    FrameOutputOptions::default()
        .with_pixel_format(PixelFormat::Gray8)
        .with_resolution(Some(64), None)
}

#[test]
fn metadata_matches_fixture() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let metadata = FfmpegSource::new(path).metadata().expect("Failed to read metadata");
    assert_eq!((metadata.width, metadata.height), (640, 480));
    assert!((metadata.frames_per_second - 30.0).abs() < 0.01);
    assert!(
        (148..=152).contains(&metadata.frame_count),
        "5s at 30 fps, got {}",
        metadata.frame_count
    );
}

#[test]
fn frames_follow_output_options() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FfmpegSource::new(path).with_output(small_gray());
    let mut reader = source.open().expect("Failed to open fixture");
    let (index, frame) = reader.next_frame().unwrap().expect("at least one frame");

    assert_eq!(index, 0);
    assert_eq!((frame.width(), frame.height(), frame.channels()), (64, 48, 1));
    assert_eq!(frame.data().len(), 64 * 48);
}

#[test]
fn sequential_indices_are_contiguous() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut reader = FfmpegSource::new(path)
        .with_output(small_gray())
        .open()
        .expect("Failed to open fixture");
    let mut expected = 0;
    while let Some((index, _)) = reader.next_frame().unwrap() {
        assert_eq!(index, expected);
        expected += 1;
    }
    assert!(expected > 0);
}

#[test]
fn seek_lands_within_tolerance() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FfmpegSource::new(path).with_output(small_gray());

    let mut sequential = Vec::new();
    let mut reader = source.open().expect("Failed to open fixture");
    while let Some((index, frame)) = reader.next_frame().unwrap() {
        sequential.push((index, frame));
    }

    for target in [1_u64, 29, 45, 90, 121] {
        let mut reader = source.open().expect("Failed to open fixture");
        reader.decode_from(target).expect("seek failed");
        let (index, frame) = reader.next_frame().unwrap().expect("frame after seek");

        assert!(
            index >= target && index - target <= SEEK_TOLERANCE_FRAMES,
            "asked for {target}, got {index}"
        );
        let (_, expected) = &sequential[index as usize];
        assert_eq!(&frame, expected, "frame {index} differs from sequential decode");
    }
}

#[test]
fn parallel_scan_matches_single_worker() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FfmpegSource::new(path).with_output(small_gray());
    let base = ScanOptions::new().with_window(Duration::from_secs(1));

    let reference = PeakScanner::new(base.clone().with_threads(1))
        .scan(&source)
        .expect("single-worker scan");
    let parallel = PeakScanner::new(
        base.with_threads(4)
            .with_overlap(PartitionOverlap::Window),
    )
    .scan(&source)
    .expect("parallel scan");

    assert_eq!(parallel.window_start, reference.window_start);
    assert_eq!(parallel.max_variation, reference.max_variation);
    assert_eq!(parallel.window_frames, 30);
}
