//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session-level errors. Any of these aborts the scan.
///
/// Per-file problems never surface here; they become [`ScanWarning`]s in the
/// session's error log.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for the root path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Root path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan was cancelled before it completed.
    #[error("Scan cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of per-file scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The external signature tool could not classify this file
    /// (missing binary, non-zero exit, malformed output).
    ToolUnavailable,
    /// Entry could not be read during traversal (permission, vanished, metadata).
    UnreadableEntry,
    /// File could not be fully read while computing its digest.
    HashFailure,
    /// Symbolic link target does not exist.
    BrokenSymlink,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolUnavailable => write!(f, "ToolUnavailable"),
            Self::UnreadableEntry => write!(f, "UnreadableEntry"),
            Self::HashFailure => write!(f, "HashFailure"),
            Self::BrokenSymlink => write!(f, "BrokenSymlink"),
        }
    }
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create an unreadable-entry warning from an I/O error.
    pub fn unreadable(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        let message = match error.kind() {
            std::io::ErrorKind::PermissionDenied => format!("Permission denied: {}", path.display()),
            std::io::ErrorKind::NotFound => format!("Vanished during scan: {}", path.display()),
            _ => format!("Read error: {error}"),
        };
        Self {
            path,
            message,
            kind: WarningKind::UnreadableEntry,
        }
    }

    /// Create a broken symlink warning.
    pub fn broken_symlink(path: impl Into<PathBuf>, target: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("Broken symlink: {} -> {target}", path.display()),
            path,
            kind: WarningKind::BrokenSymlink,
        }
    }

    /// Create a hash failure warning.
    pub fn hash_failure(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: format!("Excluded from duplicate analysis: {reason}"),
            kind: WarningKind::HashFailure,
        }
    }

    /// Create a tool-unavailable warning.
    pub fn tool_unavailable(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: format!("Signature tool failed, using heuristic: {reason}"),
            kind: WarningKind::ToolUnavailable,
        }
    }
}
