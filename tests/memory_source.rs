//! In-memory frame source tests.

use peakclip::{Frame, FrameReader, MediaSource, MemorySource, PeakclipError};

fn ramp(count: u8) -> Vec<Frame> {
    (0..count).map(|value| Frame::filled(2, 2, 3, value)).collect()
}

#[test]
fn reader_yields_every_frame_in_order() {
    let source = MemorySource::new(25.0, ramp(5)).unwrap();
    let mut reader = source.open().unwrap();
    let mut indices = Vec::new();
    while let Some((index, frame)) = reader.next_frame().unwrap() {
        assert_eq!(frame.data()[0] as u64, index);
        indices.push(index);
    }
    assert_eq!(indices, [0, 1, 2, 3, 4]);
}

#[test]
fn decode_past_end_yields_nothing() {
    let source = MemorySource::new(25.0, ramp(3)).unwrap();
    let mut reader = source.open().unwrap();
    reader.decode_from(10).unwrap();
    assert!(reader.next_frame().unwrap().is_none());
}

#[test]
fn metadata_reflects_frames() {
    let source = MemorySource::new(30.0, ramp(12)).unwrap();
    let reader = source.open().unwrap();
    assert_eq!(reader.metadata().frame_count, 12);
    assert_eq!((reader.metadata().width, reader.metadata().height), (2, 2));
}

#[test]
fn mixed_shapes_are_rejected() {
    let frames = vec![Frame::filled(2, 2, 3, 0), Frame::filled(3, 2, 3, 0)];
    assert!(matches!(
        MemorySource::new(25.0, frames),
        Err(PeakclipError::DimensionMismatch { .. })
    ));
}

#[test]
fn non_positive_rate_is_rejected() {
    assert!(MemorySource::new(0.0, ramp(2)).is_err());
    assert!(MemorySource::new(f64::NAN, ramp(2)).is_err());
}

#[test]
fn readers_are_counted_until_dropped() {
    let source = MemorySource::new(25.0, ramp(2)).unwrap();
    let first = source.open().unwrap();
    let second = source.clone().open().unwrap();
    assert_eq!(source.open_readers(), 2);
    drop(first);
    drop(second);
    assert_eq!(source.open_readers(), 0);
}
