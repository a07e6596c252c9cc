//! Directory walking for archivizm.
//!
//! This crate turns a root path into a lazy stream of file record
//! skeletons using jwalk for traversal.
//!
//! # Overview
//!
//! - **Lazy**: records are produced while directories are read, so a large
//!   device never has to be materialized before processing starts
//! - **Deterministic**: entries are sorted by name at every level
//! - **Tolerant**: unreadable or vanished entries become warnings and the
//!   walk continues
//! - **Safe on links**: symbolic links are recorded, never followed
//!
//! # Example
//!
//! ```rust,no_run
//! use archivizm_scan::{ScanConfig, TreeWalker, WalkItem};
//!
//! let walker = TreeWalker::new(ScanConfig::new("/media/usb"));
//! for item in walker.walk().unwrap() {
//!     match item {
//!         WalkItem::File(record) => println!("{} ({} bytes)", record.path.display(), record.size),
//!         WalkItem::Symlink(link) => println!("link {}", link.path.display()),
//!         WalkItem::Skipped(warning) => eprintln!("skipped: {}", warning.message),
//!     }
//! }
//! ```

mod progress;
mod walker;

pub use progress::{ProgressTracker, ScanPhase, ScanProgress};
pub use walker::{RecordIter, TreeWalker, WalkItem};

// Re-export core types for convenience
pub use archivizm_core::{
    FileRecord, ScanConfig, ScanError, ScanScope, ScanWarning, SymlinkRecord, Timestamps,
    WarningKind,
};
