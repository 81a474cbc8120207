//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::path::Path;
use std::time::Duration;

use peakclip::{
    ClipExtractor, FfmpegClipExtractor, FfmpegSource, Frame, MediaSource, MemorySource,
    PeakScanner, PeakclipError, ScanOptions, frame_variation,
};

#[test]
fn open_nonexistent_file() {
    let result = FfmpegSource::new("this_file_does_not_exist.mp4").open();
    let error_message = result.err().expect("open should fail").to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegSource::new(&invalid_file_path).open();
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn scan_of_missing_file_fails_before_partitioning() {
    let scanner = PeakScanner::new(ScanOptions::new().with_threads(2));
    let result = scanner.scan(&FfmpegSource::new("missing/video.mp4"));
    assert!(matches!(result, Err(PeakclipError::FileOpen { .. })));

    let result = scanner.scan_file("missing/video.mp4");
    assert!(matches!(result, Err(PeakclipError::FileOpen { .. })));
}

#[test]
fn extracting_from_missing_file_is_a_clip_error() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("clip.mp4");

    let result = FfmpegClipExtractor.extract(
        Path::new("missing/video.mp4"),
        Duration::ZERO,
        Duration::from_secs(1),
        &output,
    );
    match result {
        Err(PeakclipError::ClipExtraction { path, .. }) => {
            assert_eq!(path, Path::new("missing/video.mp4"));
        }
        other => panic!("Expected ClipExtraction, got: {other:?}"),
    }
}

#[test]
fn mismatched_frames_report_both_shapes() {
    let error = frame_variation(&Frame::filled(4, 4, 3, 0), &Frame::filled(4, 2, 3, 0))
        .expect_err("shapes differ");
    let message = error.to_string();
    assert!(message.contains("4x4x3"), "{message}");
    assert!(message.contains("4x2x3"), "{message}");
}

#[test]
fn short_buffer_is_an_invalid_frame() {
    assert!(matches!(
        Frame::new(4, 4, 3, vec![0; 47]),
        Err(PeakclipError::InvalidFrame(_))
    ));
}

#[test]
fn no_candidate_message_names_both_lengths() {
    let frames = (0..50).map(|_| Frame::filled(2, 2, 1, 0)).collect();
    let source = MemorySource::new(24.0, frames).unwrap();
    let error = PeakScanner::new(ScanOptions::new().with_threads(1))
        .scan(&source)
        .expect_err("video is shorter than the window");
    assert_eq!(
        error.to_string(),
        "No complete 240-frame window in 50 frames"
    );
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: PeakclipError = io.into();
    assert!(matches!(error, PeakclipError::Io(_)));
}
