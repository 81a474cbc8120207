//! Benchmarks for the variation metric, the window scanner and full scans.
//!
//! Run with: cargo bench
//!
//! The file-based benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, num::NonZeroU64, path::Path, time::Duration};

use criterion::{BenchmarkId, Criterion, Throughput};
use peakclip::{
    FfmpegLogLevel, FfmpegSource, Frame, FrameOutputOptions, MemorySource, PartitionOverlap,
    PeakScanner, PixelFormat, ScanOptions, WindowScanner, frame_variation,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn noise_frame(width: u32, height: u32, seed: u64) -> Frame {
    let mut state = seed;
    let data = (0..width as usize * height as usize * 3)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 56) as u8
        })
        .collect();
    Frame::new(width, height, 3, data).unwrap()
}

fn benchmark_frame_variation(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("frame variation");
    for (width, height) in [(320, 180), (1280, 720), (1920, 1080)] {
        let previous = noise_frame(width, height, 1);
        let current = noise_frame(width, height, 2);
        group.throughput(Throughput::Bytes(previous.data().len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(previous, current),
            |bencher, (previous, current)| {
                bencher.iter(|| frame_variation(black_box(previous), black_box(current)).unwrap());
            },
        );
    }
    group.finish();
}

fn benchmark_window_scanner(criterion: &mut Criterion) {
    let values: Vec<u64> = (0..100_000_u64).map(|index| (index * 7919) % 10_007).collect();

    let mut group = criterion.benchmark_group("window scanner");
    group.throughput(Throughput::Elements(values.len() as u64));
    for window in [24_u64, 240, 2400] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |bencher, &window| {
            bencher.iter(|| {
                let mut scanner = WindowScanner::new(NonZeroU64::new(window).unwrap());
                for (index, &value) in values.iter().enumerate() {
                    scanner.push(index as u64 + 1, value);
                }
                black_box(scanner.best())
            });
        });
    }
    group.finish();
}

fn benchmark_memory_scan(criterion: &mut Criterion) {
    let frames: Vec<Frame> = (0..2400).map(|index| noise_frame(64, 36, index)).collect();
    let source = MemorySource::new(24.0, frames).unwrap();

    let mut group = criterion.benchmark_group("in-memory scan, 2400 frames");
    group.sample_size(20);
    for threads in [1, 2, 4, 8] {
        for overlap in [PartitionOverlap::Disjoint, PartitionOverlap::Window] {
            let scanner = PeakScanner::new(
                ScanOptions::new()
                    .with_window(Duration::from_secs(10))
                    .with_threads(threads)
                    .with_overlap(overlap),
            );
            group.bench_function(format!("{threads} threads, {overlap:?}"), |bencher| {
                bencher.iter(|| scanner.scan(&source).unwrap());
            });
        }
    }
    group.finish();
}

fn benchmark_file_scan(criterion: &mut Criterion) {
    peakclip::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let mut group = criterion.benchmark_group("file scan");
    group.sample_size(10);
    for (label, output) in [
        ("rgb8 full size", FrameOutputOptions::default()),
        (
            "gray8 160px",
            FrameOutputOptions::default()
                .with_pixel_format(PixelFormat::Gray8)
                .with_resolution(Some(160), None),
        ),
    ] {
        let source = FfmpegSource::new(SAMPLE_VIDEO).with_output(output);
        for threads in [1, 4] {
            let scanner = PeakScanner::new(
                ScanOptions::new()
                    .with_window(Duration::from_secs(1))
                    .with_threads(threads),
            );
            group.bench_function(format!("{label}, {threads} threads"), |bencher| {
                bencher.iter(|| scanner.scan(&source).unwrap());
            });
        }
    }
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_frame_variation,
    benchmark_window_scanner,
    benchmark_memory_scan,
    benchmark_file_scan,
);
criterion::criterion_main!(benches);
