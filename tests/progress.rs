//! Progress and cancellation integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use peakclip::{
    CancellationToken, Frame, MemorySource, OperationType, PeakScanner, ProgressCallback,
    ProgressInfo, ScanOptions, ScanPhase, WorkerProgress,
};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::new().is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

// ── WorkerProgress ────────────────────────────────────────────────

#[test]
fn worker_counters_are_independent() {
    let workers: Vec<WorkerProgress> = (0..3).map(|id| WorkerProgress::new(id, 100)).collect();
    std::thread::scope(|scope| {
        for (index, worker) in workers.iter().enumerate() {
            scope.spawn(move || {
                for _ in 0..(index + 1) * 10 {
                    worker.record_frame();
                }
            });
        }
    });

    let processed: Vec<u64> = workers
        .iter()
        .map(|worker| worker.snapshot().frames_processed)
        .collect();
    assert_eq!(processed, [10, 20, 30]);
}

// ── ProgressInfo from a scan ───────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

#[test]
fn scan_always_delivers_a_final_snapshot() {
    let frames = (0..480_u32)
        .map(|index| Frame::filled(2, 2, 1, (index % 7) as u8 * 30))
        .collect();
    let source = MemorySource::new(24.0, frames).unwrap();
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });

    // Interval far longer than the scan: only the final snapshot arrives.
    let options = ScanOptions::new()
        .with_window(Duration::from_secs(2))
        .with_threads(2)
        .with_progress(recorder.clone())
        .with_report_interval(Duration::from_secs(60));
    PeakScanner::new(options).scan(&source).unwrap();

    let infos = recorder.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    let info = &infos[0];
    assert_eq!(info.operation, OperationType::Scan);
    assert_eq!(info.phase, ScanPhase::Aggregating);
    assert_eq!(info.current, 480);
    assert_eq!(info.percentage, Some(100.0));
    assert_eq!(info.estimated_remaining, Some(Duration::ZERO));
}
