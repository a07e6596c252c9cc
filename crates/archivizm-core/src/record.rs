//! Per-file records and the values attached to them.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Label used for records that have no format result.
pub const UNIDENTIFIED_LABEL: &str = "Unidentified";

/// MD5 content digest for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 16]);

impl ContentDigest {
    /// Create a new ContentDigest from raw bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// File metadata timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time (if available).
    pub accessed: Option<SystemTime>,
    /// Creation time (if available, platform-dependent).
    pub created: Option<SystemTime>,
}

impl Timestamps {
    /// Create timestamps with only modified time.
    pub fn with_modified(modified: SystemTime) -> Self {
        Self {
            modified,
            accessed: None,
            created: None,
        }
    }

    /// Create timestamps with all available times.
    pub fn new(
        modified: SystemTime,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Self {
        Self {
            modified,
            accessed,
            created,
        }
    }

    /// Read timestamps from file metadata.
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self::new(
            metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            metadata.accessed().ok(),
            metadata.created().ok(),
        )
    }
}

/// How a format label was obtained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
pub enum FormatMethod {
    /// Matched against curated binary signatures by the external tool.
    #[serde(rename = "tool")]
    #[strum(serialize = "tool")]
    ExternalTool,
    /// Magic-byte or extension guess.
    #[serde(rename = "heuristic")]
    #[strum(serialize = "heuristic")]
    Heuristic,
    /// Neither strategy produced a label.
    #[serde(rename = "unknown")]
    #[strum(serialize = "unknown")]
    Unrecognized,
}

/// Format classification of a single file. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResult {
    /// Human-readable format name.
    pub label: CompactString,
    /// Strategy that produced the label.
    pub method: FormatMethod,
    /// PRONOM identifier (tool results only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puid: Option<CompactString>,
    /// MIME type, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<CompactString>,
    /// Format version, when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<CompactString>,
    /// Raw signature output of the tool (tool results only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl FormatResult {
    /// Create a result reported by the external signature tool.
    pub fn from_tool(
        label: impl Into<CompactString>,
        puid: Option<CompactString>,
        mime: Option<CompactString>,
        version: Option<CompactString>,
        raw_output: String,
    ) -> Self {
        Self {
            label: label.into(),
            method: FormatMethod::ExternalTool,
            puid,
            mime,
            version,
            raw_output: Some(raw_output),
        }
    }

    /// Create a heuristic result.
    pub fn heuristic(label: impl Into<CompactString>, mime: Option<&str>) -> Self {
        Self {
            label: label.into(),
            method: FormatMethod::Heuristic,
            puid: None,
            mime: mime.map(CompactString::from),
            version: None,
            raw_output: None,
        }
    }

    /// Create an unrecognized result.
    pub fn unrecognized() -> Self {
        Self {
            label: CompactString::from("Unrecognized"),
            method: FormatMethod::Unrecognized,
            puid: None,
            mime: None,
            version: None,
            raw_output: None,
        }
    }

    /// Whether a label was actually determined.
    pub fn is_recognized(&self) -> bool {
        self.method != FormatMethod::Unrecognized
    }
}

/// A regular file found by the walker.
///
/// Created with path, size and timestamps populated; the identifier sets
/// `format` and the hasher sets `digest`. Read-only once both are done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes at traversal time.
    pub size: u64,
    /// File metadata timestamps.
    pub timestamps: Timestamps,
    /// Format classification, once identified.
    pub format: Option<FormatResult>,
    /// Content digest, only computed for duplicate analysis.
    pub digest: Option<ContentDigest>,
}

impl FileRecord {
    /// Create a record skeleton with format and digest pending.
    pub fn new(path: impl Into<PathBuf>, size: u64, timestamps: Timestamps) -> Self {
        Self {
            path: path.into(),
            size,
            timestamps,
            format: None,
            digest: None,
        }
    }

    /// File name component, lossily converted.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercase extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    /// Format label, or `"Unidentified"` when identification has not run.
    pub fn format_label(&self) -> &str {
        self.format
            .as_ref()
            .map(|f| f.label.as_str())
            .unwrap_or(UNIDENTIFIED_LABEL)
    }

    /// Confidence source of the format label.
    pub fn format_method(&self) -> FormatMethod {
        self.format
            .as_ref()
            .map(|f| f.method)
            .unwrap_or(FormatMethod::Unrecognized)
    }
}

/// Lowercase extension of a path without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// A symbolic link seen during traversal. Links are never followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkRecord {
    /// Path of the link itself.
    pub path: PathBuf,
    /// Link target as stored in the link.
    pub target: PathBuf,
    /// Target resolves outside the scan root.
    pub outside_root: bool,
    /// Target does not exist.
    pub broken: bool,
}

/// Files sharing one size and one content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Digest shared by all members.
    pub digest: ContentDigest,
    /// Size of each member in bytes.
    pub size: u64,
    /// Members, ordered by byte-wise path comparison. Always two or more.
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Number of files in the group.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Bytes freed by keeping one copy: `(members - 1) * size`.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * self.members.len().saturating_sub(1) as u64
    }

    /// Paths of all members.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.members.iter().map(|m| m.path.as_path())
    }
}
