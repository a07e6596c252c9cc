//! Core types for archivizm.
//!
//! This crate provides the data model shared by the scanning, identification
//! and analysis crates: per-file records, format results, content digests,
//! the scan session container, the error taxonomy and configuration.

mod config;
mod error;
mod record;
mod session;
mod settings;

pub use config::{ScanConfig, ScanConfigBuilder, ScanScope};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use record::{
    ContentDigest, DuplicateGroup, FileRecord, FormatMethod, FormatResult, SymlinkRecord,
    Timestamps, UNIDENTIFIED_LABEL, extension_of,
};
pub use session::{ErrorLog, ScanSession, ScanSummary, ToolStatus};
pub use settings::{DisplayedField, Settings, SettingsError};
