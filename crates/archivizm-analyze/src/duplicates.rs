//! Duplicate file detection using content hashing.
//!
//! Two phases:
//! 1. Bucket files by exact size; singleton buckets are dropped unhashed
//! 2. Hash the remaining files in parallel and re-bucket by digest
//!
//! Matching is on whole-file content only. Nothing is remembered between
//! runs, so every call rehashes its candidates.

use std::cmp::Ordering;
use std::collections::HashMap;

use derive_builder::Builder;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use archivizm_core::{ContentDigest, DuplicateGroup, FileRecord, ScanError, ScanWarning};

use crate::hasher::{ContentHasher, HashError, Md5Hasher};

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DuplicateConfig {
    /// Minimum file size to consider.
    #[builder(default = "0")]
    #[serde(default)]
    pub min_size: u64,

    /// Maximum file size to consider.
    #[builder(default = "u64::MAX")]
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Leave zero-byte files out of duplicate analysis.
    #[builder(default = "false")]
    #[serde(default)]
    pub exclude_empty: bool,
}

fn default_max_size() -> u64 {
    u64::MAX
}

impl DuplicateConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let min = self.min_size.unwrap_or(0);
        let max = self.max_size.unwrap_or(u64::MAX);
        if min > max {
            return Err(format!("min_size ({min}) exceeds max_size ({max})"));
        }
        Ok(())
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
            exclude_empty: false,
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }

    fn accepts(&self, size: u64) -> bool {
        size >= self.min_size && size <= self.max_size && !(self.exclude_empty && size == 0)
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups, by reclaimable bytes descending then first member path.
    pub groups: Vec<DuplicateGroup>,

    /// Files within the size limits.
    pub files_considered: u64,

    /// Files fully digested.
    pub files_hashed: u64,

    /// Files excluded because hashing failed.
    pub failures: Vec<ScanWarning>,

    /// Sum of reclaimable bytes over all groups.
    pub total_reclaimable_bytes: u64,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Duplicate file finder.
pub struct DuplicateFinder<H = Md5Hasher> {
    config: DuplicateConfig,
    hasher: H,
}

impl DuplicateFinder<Md5Hasher> {
    /// Create a new duplicate finder with default config.
    pub fn new() -> Self {
        Self::with_config(DuplicateConfig::default())
    }

    /// Create a new duplicate finder with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self {
            config,
            hasher: Md5Hasher::new(),
        }
    }
}

impl Default for DuplicateFinder<Md5Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ContentHasher> DuplicateFinder<H> {
    /// Use a specific hasher.
    pub fn with_hasher(config: DuplicateConfig, hasher: H) -> Self {
        Self { config, hasher }
    }

    /// Size bounds and empty-file policy this finder applies.
    pub fn config(&self) -> &DuplicateConfig {
        &self.config
    }

    /// Find duplicate groups among `records`.
    ///
    /// Digests of hashed files are written back into the records; files
    /// whose hashing failed keep `digest: None` and are reported in
    /// `failures`. Hashing runs on the current rayon pool.
    pub fn find_duplicates(
        &self,
        records: &mut [FileRecord],
        cancel: &CancellationToken,
    ) -> Result<DuplicateReport, ScanError> {
        let considered: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.config.accepts(r.size))
            .map(|(i, _)| i)
            .collect();
        let files_considered = considered.len() as u64;

        // Phase 1: Group by size
        let mut candidates: Vec<usize> = considered
            .into_iter()
            .into_group_map_by(|&i| records[i].size)
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .flatten()
            .collect();
        candidates.sort_unstable();

        tracing::debug!(
            files_considered,
            candidates = candidates.len(),
            "size pre-filter done"
        );

        // Phase 2: Hash candidates in parallel
        let shared: &[FileRecord] = records;
        let outcomes: Vec<(usize, Option<Result<ContentDigest, HashError>>)> = candidates
            .par_iter()
            .map(|&i| {
                if cancel.is_cancelled() {
                    return (i, None);
                }
                let record = &shared[i];
                (i, Some(self.hasher.hash_file(&record.path, record.size)))
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let mut failures = Vec::new();
        let mut buckets: HashMap<(u64, ContentDigest), Vec<usize>> = HashMap::new();

        for (i, outcome) in outcomes {
            match outcome {
                Some(Ok(digest)) => {
                    records[i].digest = Some(digest);
                    buckets.entry((records[i].size, digest)).or_default().push(i);
                }
                Some(Err(e)) => {
                    tracing::warn!("excluding from duplicate analysis: {e}");
                    records[i].digest = None;
                    failures.push(ScanWarning::hash_failure(&records[i].path, e));
                }
                None => return Err(ScanError::Cancelled),
            }
        }

        let files_hashed: u64 = buckets.values().map(|b| b.len() as u64).sum();

        let mut groups: Vec<DuplicateGroup> = buckets
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|((size, digest), members)| {
                let mut members: Vec<FileRecord> =
                    members.into_iter().map(|i| records[i].clone()).collect();
                members.sort_by(|a, b| compare_paths(a, b));
                DuplicateGroup {
                    digest,
                    size,
                    members,
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.reclaimable_bytes()
                .cmp(&a.reclaimable_bytes())
                .then_with(|| compare_paths(&a.members[0], &b.members[0]))
        });

        let total_reclaimable_bytes = groups.iter().map(DuplicateGroup::reclaimable_bytes).sum();

        tracing::info!(
            groups = groups.len(),
            files_hashed,
            failures = failures.len(),
            total_reclaimable_bytes,
            "duplicate analysis complete"
        );

        Ok(DuplicateReport {
            groups,
            files_considered,
            files_hashed,
            failures,
            total_reclaimable_bytes,
        })
    }
}

/// Byte-wise comparison of record paths.
fn compare_paths(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.path
        .as_os_str()
        .as_encoded_bytes()
        .cmp(b.path.as_os_str().as_encoded_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivizm_core::Timestamps;
    use std::fs;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record_for(path: &Path) -> FileRecord {
        let size = fs::metadata(path).unwrap().len();
        FileRecord::new(path, size, Timestamps::with_modified(SystemTime::now()))
    }

    fn create_test_files() -> (TempDir, Vec<FileRecord>) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join("file1.txt"), "duplicate content here").unwrap();
        fs::write(root.join("file2.txt"), "duplicate content here").unwrap();
        fs::write(root.join("file3.txt"), "unique content").unwrap();
        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/file4.txt"), "duplicate content here").unwrap();
        // Same size as the duplicates, different content.
        fs::write(root.join("file5.txt"), "duplicate content HERE").unwrap();

        let records = ["file1.txt", "file2.txt", "file3.txt", "subdir/file4.txt", "file5.txt"]
            .iter()
            .map(|p| record_for(&root.join(p)))
            .collect();
        (temp, records)
    }

    #[test]
    fn test_finds_group() {
        let (_temp, mut records) = create_test_files();
        let report = DuplicateFinder::new()
            .find_duplicates(&mut records, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.count(), 3);
        assert_eq!(group.reclaimable_bytes(), 2 * 22);
        assert_eq!(report.files_considered, 5);
        // file3 has a unique size and is never hashed.
        assert_eq!(report.files_hashed, 4);
        assert!(records[2].digest.is_none());
        assert!(records[4].digest.is_some());
    }

    #[test]
    fn test_members_sorted_by_path() {
        let (_temp, mut records) = create_test_files();
        records.reverse();
        let report = DuplicateFinder::new()
            .find_duplicates(&mut records, &CancellationToken::new())
            .unwrap();

        let names: Vec<String> = report.groups[0].members.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["file1.txt", "file2.txt", "file4.txt"]);
    }

    #[test]
    fn test_cancelled_before_hashing() {
        let (_temp, mut records) = create_test_files();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = DuplicateFinder::new().find_duplicates(&mut records, &cancel);
        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(records.iter().all(|r| r.digest.is_none()));
    }

    #[test]
    fn test_size_limits() {
        let (_temp, mut records) = create_test_files();
        let config = DuplicateConfig::builder().max_size(10u64).build().unwrap();
        let report = DuplicateFinder::with_config(config)
            .find_duplicates(&mut records, &CancellationToken::new())
            .unwrap();

        assert!(!report.has_duplicates());
        assert_eq!(report.files_considered, 0);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let result = DuplicateConfig::builder()
            .min_size(100u64)
            .max_size(10u64)
            .build();
        assert!(result.is_err());
    }
}
