//! Scan session container and statistics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanScope;
use crate::error::{ScanWarning, WarningKind};
use crate::record::{DuplicateGroup, FileRecord, FormatMethod, SymlinkRecord};

/// Availability of the external signature tool for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    /// Executable and signature file both resolved.
    Available {
        executable: PathBuf,
        signature_file: PathBuf,
    },
    /// Heuristic-only (degraded) mode.
    Unavailable { reason: String },
}

impl ToolStatus {
    /// Whether tool-based identification is active.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Append-only log of per-file problems for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLog {
    entries: Vec<ScanWarning>,
}

impl ErrorLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn push(&mut self, warning: ScanWarning) {
        self.entries.push(warning);
    }

    /// Append several entries, keeping their order.
    pub fn extend(&mut self, warnings: impl IntoIterator<Item = ScanWarning>) {
        self.entries.extend(warnings);
    }

    /// Number of logged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in the order they were logged.
    pub fn iter(&self) -> std::slice::Iter<'_, ScanWarning> {
        self.entries.iter()
    }

    /// Entries of one kind.
    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &ScanWarning> {
        self.entries.iter().filter(move |w| w.kind == kind)
    }

    /// Entry count per kind.
    pub fn counts_by_kind(&self) -> BTreeMap<WarningKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a ScanWarning;
    type IntoIter = std::slice::Iter<'a, ScanWarning>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Summary statistics for a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Number of file records.
    pub total_files: u64,
    /// Sum of record sizes.
    pub total_bytes: u64,
    /// Record count per format label.
    pub by_format: BTreeMap<String, u64>,
    /// Record count per identification method.
    pub by_method: BTreeMap<FormatMethod, u64>,
    /// Record count per lowercase extension.
    pub by_extension: BTreeMap<String, u64>,
    /// Number of symbolic links seen.
    pub symlinks: u64,
    /// Number of duplicate groups.
    pub duplicate_groups: u64,
    /// Number of files that belong to a duplicate group.
    pub duplicate_files: u64,
    /// Sum over groups of `(members - 1) * size`.
    pub reclaimable_bytes: u64,
    /// Number of entries in the error log.
    pub error_count: u64,
}

/// Working set of one directory or device scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    /// Canonical root path that was scanned.
    pub root: PathBuf,
    /// Traversal scope.
    pub scope: ScanScope,
    /// Collected file records, in traversal order.
    pub records: Vec<FileRecord>,
    /// Symbolic links seen (never followed).
    pub symlinks: Vec<SymlinkRecord>,
    /// Duplicate groups, present only when duplicate analysis ran.
    pub duplicates: Option<Vec<DuplicateGroup>>,
    /// Aggregated statistics.
    pub summary: ScanSummary,
    /// Per-file problems.
    pub errors: ErrorLog,
    /// Signature tool availability for this scan.
    pub tool_status: ToolStatus,
    /// When the scan started.
    pub started_at: SystemTime,
    /// How long the scan took.
    pub duration: Duration,
}

impl ScanSession {
    /// Start an empty session.
    pub fn new(root: impl Into<PathBuf>, scope: ScanScope, tool_status: ToolStatus) -> Self {
        Self {
            root: root.into(),
            scope,
            records: Vec::new(),
            symlinks: Vec::new(),
            duplicates: None,
            summary: ScanSummary::default(),
            errors: ErrorLog::new(),
            tool_status,
            started_at: SystemTime::now(),
            duration: Duration::ZERO,
        }
    }

    /// Duplicate groups, empty when duplicate analysis did not run.
    pub fn duplicate_groups(&self) -> &[DuplicateGroup] {
        self.duplicates.as_deref().unwrap_or(&[])
    }

    /// Check if any per-file problems were logged.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether identification ran without the external tool.
    pub fn is_degraded(&self) -> bool {
        !self.tool_status.is_available()
    }
}
