//! Splitting a frame range into per-worker partitions.
//!
//! Boundaries are placed at `round(i * total_frames / count)`, which yields
//! contiguous, non-overlapping owned ranges covering `[0, total_frames)`.
//!
//! In the default [`PartitionOverlap::Disjoint`] mode every worker reads
//! exactly its owned range, so a maximal window that straddles a boundary
//! can be missed. [`PartitionOverlap::Window`] makes the scan exact by
//! letting each worker read `window_frames - 1` frames past its owned end,
//! plus the one frame before its owned start that the first difference
//! needs. Window starts are still only accepted inside the owned range, so
//! every window is evaluated by exactly one partition.

use std::ops::Range;

/// How partitions treat windows that cross their boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionOverlap {
    /// Workers read only their owned range. Cheapest; can miss a window
    /// that crosses a boundary.
    #[default]
    Disjoint,
    /// Workers read ahead into the next partition far enough to complete
    /// every window that starts in their owned range.
    Window,
}

/// A contiguous sub-range of frames assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Position of this partition, `0..count`.
    pub id: usize,
    /// First owned frame.
    pub start: u64,
    /// One past the last owned frame.
    pub end: u64,
    /// First frame the worker decodes.
    pub scan_start: u64,
    /// One past the last frame the worker decodes.
    pub scan_end: u64,
}

impl Partition {
    /// Owned frame range.
    pub fn owned(&self) -> Range<u64> {
        self.start..self.end
    }

    /// Frame range the worker decodes.
    pub fn scan_range(&self) -> Range<u64> {
        self.scan_start..self.scan_end
    }

    /// Number of owned frames.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// `true` if the partition owns no frames.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Number of frames the worker decodes.
    pub fn scan_len(&self) -> u64 {
        self.scan_end - self.scan_start
    }

    /// `true` if a complete window of `window_frames` differences fits in
    /// the decoded range.
    pub fn fits_window(&self, window_frames: u64) -> bool {
        self.scan_len() > window_frames
    }
}

/// Compute `count + 1` boundaries, `round(i * total_frames / count)`.
///
/// The first boundary is always 0 and the last is always `total_frames`.
/// Returns an empty vector when `count` is zero.
pub fn boundaries(total_frames: u64, count: usize) -> Vec<u64> {
    if count == 0 {
        return Vec::new();
    }
    let total = u128::from(total_frames);
    let count = count as u128;
    (0..=count)
        // Integer round-half-up of i * total / count.
        .map(|i| ((2 * i * total + count) / (2 * count)) as u64)
        .collect()
}

/// Split `total_frames` into `count` partitions.
///
/// `window_frames` is only consulted in [`PartitionOverlap::Window`] mode.
///
/// # Example
///
/// ```
/// use peakclip::{PartitionOverlap, partition_frames};
///
/// let parts = partition_frames(2400, 4, 240, PartitionOverlap::Disjoint);
/// let owned: Vec<_> = parts.iter().map(|p| (p.start, p.end)).collect();
/// assert_eq!(owned, [(0, 600), (600, 1200), (1200, 1800), (1800, 2400)]);
/// ```
pub fn partition_frames(
    total_frames: u64,
    count: usize,
    window_frames: u64,
    overlap: PartitionOverlap,
) -> Vec<Partition> {
    boundaries(total_frames, count)
        .windows(2)
        .enumerate()
        .map(|(id, bounds)| {
            let (start, end) = (bounds[0], bounds[1]);
            let (scan_start, scan_end) = match overlap {
                PartitionOverlap::Disjoint => (start, end),
                PartitionOverlap::Window if start == end => (start, end),
                PartitionOverlap::Window => (
                    start.saturating_sub(1),
                    end.saturating_add(window_frames.saturating_sub(1))
                        .min(total_frames),
                ),
            };
            Partition {
                id,
                start,
                end,
                scan_start,
                scan_end,
            }
        })
        .collect()
}
