//! Frame range partitioning tests.

use peakclip::partition::boundaries;
use peakclip::{Partition, PartitionOverlap, partition_frames};

fn assert_covers(parts: &[Partition], total_frames: u64) {
    assert_eq!(parts.first().map(|p| p.start), Some(0));
    assert_eq!(parts.last().map(|p| p.end), Some(total_frames));
    for pair in parts.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    for (index, part) in parts.iter().enumerate() {
        assert_eq!(part.id, index);
    }
}

#[test]
fn boundaries_round_to_nearest() {
    assert_eq!(boundaries(10, 4), [0, 3, 5, 8, 10]);
    assert_eq!(boundaries(2400, 4), [0, 600, 1200, 1800, 2400]);
}

#[test]
fn zero_count_yields_nothing() {
    assert!(boundaries(100, 0).is_empty());
    assert!(partition_frames(100, 0, 10, PartitionOverlap::Disjoint).is_empty());
}

#[test]
fn coverage_holds_for_awkward_sizes() {
    for total in [0_u64, 1, 7, 99, 1001, 2400, 86_399] {
        for count in 1..=24 {
            let parts = partition_frames(total, count, 240, PartitionOverlap::Disjoint);
            assert_eq!(parts.len(), count);
            assert_covers(&parts, total);
        }
    }
}

#[test]
fn more_workers_than_frames_leaves_empty_partitions() {
    let parts = partition_frames(3, 8, 1, PartitionOverlap::Window);
    assert_covers(&parts, 3);
    assert!(parts.iter().filter(|p| p.is_empty()).count() >= 5);
    assert!(parts.iter().filter(|p| p.is_empty()).all(|p| p.scan_len() == 0));
}

#[test]
fn disjoint_scan_range_equals_owned_range() {
    for part in partition_frames(2400, 4, 240, PartitionOverlap::Disjoint) {
        assert_eq!(part.scan_range(), part.owned());
    }
}

#[test]
fn window_overlap_extends_scan_range() {
    let parts = partition_frames(2400, 4, 240, PartitionOverlap::Window);
    assert_covers(&parts, 2400);

    assert_eq!(parts[0].scan_range(), 0..839);
    assert_eq!(parts[1].scan_range(), 599..1439);
    assert_eq!(parts[3].scan_range(), 1799..2400);
}

#[test]
fn fits_window_needs_one_extra_frame() {
    let part = Partition {
        id: 0,
        start: 0,
        end: 240,
        scan_start: 0,
        scan_end: 240,
    };
    assert!(!part.fits_window(240));
    assert!(part.fits_window(239));
    assert_eq!(part.len(), 240);
}
