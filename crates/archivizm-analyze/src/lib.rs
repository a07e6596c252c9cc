//! Analysis for archivizm scan sessions.
//!
//! - **Content hashing** - streaming MD5 over 1 MiB chunks
//! - **Duplicate detection** - exact whole-file matches
//! - **Summaries** - per-format, per-method and per-extension counts, plus
//!   column projections for display and export
//! - **Pipeline** - walk, identify, hash and summarize one root
//!
//! # Duplicate Detection
//!
//! 1. Group files by size; files with a unique size are never read
//! 2. Hash the rest in parallel and group by digest
//!
//! ```rust,ignore
//! use archivizm_analyze::{DuplicateConfig, PipelineConfig, ScanPipeline};
//! use archivizm_core::ScanConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::builder()
//!     .scan(ScanConfig::new("/media/usb"))
//!     .duplicates(DuplicateConfig::default())
//!     .build()
//!     .unwrap();
//! let session = ScanPipeline::new(config).run(&CancellationToken::new()).unwrap();
//!
//! for group in session.duplicate_groups() {
//!     println!("{} x{} ({} bytes reclaimable)", group.digest, group.count(), group.reclaimable_bytes());
//! }
//! ```

mod duplicates;
mod hasher;
mod pipeline;
mod summary;

pub use duplicates::{DuplicateConfig, DuplicateConfigBuilder, DuplicateFinder, DuplicateReport};
pub use hasher::{
    ContentHasher, DEFAULT_CHUNK_SIZE, HashError, Md5Hasher, digest_bytes, digest_reader,
};
pub use pipeline::{PipelineConfig, PipelineConfigBuilder, ScanPipeline};
pub use summary::{
    DuplicateRow, DuplicateView, NO_EXTENSION_LABEL, RecordTable, duplicate_rows, field_value,
    format_time, project_rows, summarize, summarize_session,
};
