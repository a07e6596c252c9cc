//! Session statistics and tabular views over records.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use archivizm_core::{
    ContentDigest, DisplayedField, DuplicateGroup, ErrorLog, FileRecord, ScanSession, ScanSummary,
    SymlinkRecord,
};

/// Bucket for files without an extension.
pub const NO_EXTENSION_LABEL: &str = "No Extension";

/// Aggregate statistics over a set of records.
pub fn summarize(
    records: &[FileRecord],
    symlinks: &[SymlinkRecord],
    groups: Option<&[DuplicateGroup]>,
    errors: &ErrorLog,
) -> ScanSummary {
    let mut summary = ScanSummary {
        total_files: records.len() as u64,
        symlinks: symlinks.len() as u64,
        error_count: errors.len() as u64,
        ..ScanSummary::default()
    };

    for record in records {
        summary.total_bytes += record.size;
        *summary
            .by_format
            .entry(record.format_label().to_string())
            .or_insert(0) += 1;
        *summary.by_method.entry(record.format_method()).or_insert(0) += 1;
        let extension = record
            .extension()
            .unwrap_or_else(|| NO_EXTENSION_LABEL.to_string());
        *summary.by_extension.entry(extension).or_insert(0) += 1;
    }

    if let Some(groups) = groups {
        summary.duplicate_groups = groups.len() as u64;
        summary.duplicate_files = groups.iter().map(|g| g.count() as u64).sum();
        summary.reclaimable_bytes = groups.iter().map(DuplicateGroup::reclaimable_bytes).sum();
    }

    summary
}

/// Aggregate statistics for a whole session.
pub fn summarize_session(session: &ScanSession) -> ScanSummary {
    summarize(
        &session.records,
        &session.symlinks,
        session.duplicates.as_deref(),
        &session.errors,
    )
}

/// Records projected onto a chosen set of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordTable {
    pub fields: Vec<DisplayedField>,
    pub rows: Vec<Vec<String>>,
}

impl RecordTable {
    /// Column headers in display order.
    pub fn headers(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.header()).collect()
    }
}

/// Project records onto `fields`, one string cell per field.
pub fn project_rows(records: &[FileRecord], fields: &[DisplayedField]) -> RecordTable {
    let rows = records
        .iter()
        .map(|record| fields.iter().map(|&f| field_value(record, f)).collect())
        .collect();
    RecordTable {
        fields: fields.to_vec(),
        rows,
    }
}

/// Render one field of a record. Missing values render empty.
pub fn field_value(record: &FileRecord, field: DisplayedField) -> String {
    let format = record.format.as_ref();
    match field {
        DisplayedField::Path => record.path.display().to_string(),
        DisplayedField::Name => record.name(),
        DisplayedField::Extension => record.extension().unwrap_or_default(),
        DisplayedField::Size => record.size.to_string(),
        DisplayedField::Created => record.timestamps.created.map(format_time).unwrap_or_default(),
        DisplayedField::Modified => format_time(record.timestamps.modified),
        DisplayedField::Format => record.format_label().to_string(),
        DisplayedField::Method => record.format_method().to_string(),
        DisplayedField::Puid => format
            .and_then(|f| f.puid.as_ref())
            .map(|p| p.to_string())
            .unwrap_or_default(),
        DisplayedField::Mime => format
            .and_then(|f| f.mime.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_default(),
        DisplayedField::Digest => record.digest.map(|d| d.to_hex()).unwrap_or_default(),
    }
}

/// RFC 3339 in UTC, whole seconds.
pub fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Which files a duplicate listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateView {
    /// Only digests shared by two or more files.
    #[default]
    DuplicatesOnly,
    /// Every hashed file, grouped by digest.
    AllFiles,
}

/// One line of a duplicate listing: a digest and the files that have it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRow {
    pub digest: ContentDigest,
    pub size: u64,
    pub paths: Vec<PathBuf>,
}

impl DuplicateRow {
    /// Paths joined with `separator`.
    pub fn joined_paths(&self, separator: &str) -> String {
        self.paths.iter().map(|p| p.display().to_string()).join(separator)
    }
}

/// Build duplicate listing rows.
///
/// `DuplicatesOnly` follows group order. `AllFiles` lists every record that
/// carries a digest, grouped by digest and ordered by first path.
pub fn duplicate_rows(
    records: &[FileRecord],
    groups: &[DuplicateGroup],
    view: DuplicateView,
) -> Vec<DuplicateRow> {
    match view {
        DuplicateView::DuplicatesOnly => groups
            .iter()
            .map(|g| DuplicateRow {
                digest: g.digest,
                size: g.size,
                paths: g.members.iter().map(|m| m.path.clone()).collect(),
            })
            .collect(),
        DuplicateView::AllFiles => {
            let mut by_digest: BTreeMap<(ContentDigest, u64), Vec<PathBuf>> = BTreeMap::new();
            for record in records {
                if let Some(digest) = record.digest {
                    by_digest
                        .entry((digest, record.size))
                        .or_default()
                        .push(record.path.clone());
                }
            }

            let mut rows: Vec<DuplicateRow> = by_digest
                .into_iter()
                .map(|((digest, size), mut paths)| {
                    paths.sort_by(|a, b| {
                        a.as_os_str()
                            .as_encoded_bytes()
                            .cmp(b.as_os_str().as_encoded_bytes())
                    });
                    DuplicateRow {
                        digest,
                        size,
                        paths,
                    }
                })
                .collect();
            rows.sort_by(|a, b| {
                a.paths[0]
                    .as_os_str()
                    .as_encoded_bytes()
                    .cmp(b.paths[0].as_os_str().as_encoded_bytes())
            });
            rows
        }
    }
}
