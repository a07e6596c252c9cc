//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Stage of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Walking the tree and identifying formats.
    #[default]
    Walking,
    /// Hashing size-collision candidates.
    Hashing,
    /// Building the summary.
    Summarizing,
    /// Session finished.
    Done,
}

/// Progress information during a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanProgress {
    /// Current stage.
    pub phase: ScanPhase,
    /// Number of files recorded so far.
    pub files_scanned: u64,
    /// Total bytes across recorded files.
    pub bytes_scanned: u64,
    /// Number of files whose content has been digested.
    pub files_hashed: u64,
    /// Most recent path handled.
    pub current_path: PathBuf,
    /// Number of warnings encountered.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Accumulates counters and produces [`ScanProgress`] snapshots.
#[derive(Debug)]
pub struct ProgressTracker {
    start_time: Instant,
    phase: ScanPhase,
    files_scanned: u64,
    bytes_scanned: u64,
    files_hashed: u64,
    errors_count: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase: ScanPhase::Walking,
            files_scanned: 0,
            bytes_scanned: 0,
            files_hashed: 0,
            errors_count: 0,
            current_path: PathBuf::new(),
        }
    }

    pub fn set_phase(&mut self, phase: ScanPhase) {
        self.phase = phase;
    }

    pub fn record_file(&mut self, size: u64) {
        self.files_scanned += 1;
        self.bytes_scanned += size;
    }

    pub fn record_hashed(&mut self, count: u64) {
        self.files_hashed += count;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn set_current_path(&mut self, path: PathBuf) {
        self.current_path = path;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            phase: self.phase,
            files_scanned: self.files_scanned,
            bytes_scanned: self.bytes_scanned,
            files_hashed: self.files_hashed,
            current_path: self.current_path.clone(),
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
