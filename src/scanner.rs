//! Moving-sum window scan.
//!
//! [`WindowScanner`] keeps the last `window_frames` variation values in a
//! fixed-capacity FIFO together with their running sum. Each push costs O(1):
//! once the FIFO is full, the evicted value is subtracted before the new one
//! is added. Only complete windows are candidates, and a later window must
//! be strictly greater to replace the current best, so the first-occurring
//! maximum wins on ties.
//!
//! The variation pushed for frame `i` is the difference between frames
//! `i - 1` and `i`, so the window whose last difference is at frame `i`
//! starts at `i - window_frames + 1`.

use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::ops::Range;

use crate::error::PeakclipError;
use crate::frame::Frame;
use crate::partition::Partition;
use crate::progress::WorkerProgress;
use crate::source::FrameReader;
use crate::variation::{Variation, frame_variation};

/// The best complete window seen by a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCandidate {
    /// First frame of the window.
    pub start: u64,
    /// Sum of the window's variation values.
    pub variation: Variation,
}

/// Incremental scanner over a stream of per-frame variation values.
///
/// # Example
///
/// ```
/// use std::num::NonZeroU64;
///
/// use peakclip::WindowScanner;
///
/// let mut scanner = WindowScanner::new(NonZeroU64::new(2).unwrap());
/// for (index, variation) in [(1, 5), (2, 1), (3, 9), (4, 9), (5, 0)] {
///     scanner.push(index, variation);
/// }
/// let best = scanner.best().unwrap();
/// assert_eq!((best.start, best.variation), (3, 18));
/// ```
#[derive(Debug, Clone)]
pub struct WindowScanner {
    window_frames: u64,
    variations: VecDeque<Variation>,
    running_sum: Variation,
    accepted_starts: Range<u64>,
    best: Option<WindowCandidate>,
}

impl WindowScanner {
    /// Create a scanner for windows of `window_frames` variation values.
    pub fn new(window_frames: NonZeroU64) -> Self {
        let window_frames = window_frames.get();
        Self {
            window_frames,
            variations: VecDeque::with_capacity(window_frames.min(1 << 20) as usize),
            running_sum: 0,
            accepted_starts: 0..u64::MAX,
            best: None,
        }
    }

    /// Only consider windows whose start lies in `range`.
    ///
    /// Windows outside the range still flow through the running sum.
    #[must_use]
    pub fn with_accepted_starts(mut self, range: Range<u64>) -> Self {
        self.accepted_starts = range;
        self
    }

    /// Window length in frames.
    pub fn window_frames(&self) -> u64 {
        self.window_frames
    }

    /// Record the variation between frame `frame_index - 1` and `frame_index`.
    pub fn push(&mut self, frame_index: u64, variation: Variation) {
        if self.is_full()
            && let Some(evicted) = self.variations.pop_front()
        {
            self.running_sum -= evicted;
        }
        self.variations.push_back(variation);
        self.running_sum += variation;

        if !self.is_full() {
            return;
        }

        let start = (frame_index + 1).saturating_sub(self.window_frames);
        if !self.accepted_starts.contains(&start) {
            return;
        }
        if self
            .best
            .is_none_or(|best| self.running_sum > best.variation)
        {
            self.best = Some(WindowCandidate {
                start,
                variation: self.running_sum,
            });
        }
    }

    /// Sum of the values currently in the window.
    pub fn running_sum(&self) -> Variation {
        self.running_sum
    }

    /// `true` once `window_frames` values have been pushed.
    pub fn is_full(&self) -> bool {
        self.variations.len() as u64 == self.window_frames
    }

    /// The best complete window so far, or `None` if no window completed.
    pub fn best(&self) -> Option<WindowCandidate> {
        self.best
    }
}

/// Decode `partition`'s scan range from `reader` and return its best window.
///
/// `interrupt_check` runs before every frame and aborts the scan with its
/// error (cancellation, timeout). Returns `Ok(None)` when the range held too
/// few frames for a complete window.
pub(crate) fn scan_frames<R: FrameReader + ?Sized>(
    reader: &mut R,
    partition: &Partition,
    window_frames: NonZeroU64,
    progress: &WorkerProgress,
    interrupt_check: &dyn Fn() -> Result<(), PeakclipError>,
) -> Result<Option<WindowCandidate>, PeakclipError> {
    reader.decode_from(partition.scan_start)?;

    let mut scanner = WindowScanner::new(window_frames).with_accepted_starts(partition.owned());
    let mut previous: Option<Frame> = None;

    while let Some((index, frame)) = reader.next_frame()? {
        if index < partition.scan_start {
            continue;
        }
        if index >= partition.scan_end {
            break;
        }
        interrupt_check()?;

        if let Some(previous) = &previous {
            scanner.push(index, frame_variation(previous, &frame)?);
        }
        previous = Some(frame);
        progress.record_frame();
    }

    Ok(scanner.best())
}
