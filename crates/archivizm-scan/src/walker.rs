//! JWalk-based lazy directory walker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{DirEntryIter, Parallelism, WalkDir};

use archivizm_core::{
    FileRecord, ScanConfig, ScanError, ScanScope, ScanWarning, SymlinkRecord, Timestamps,
    WarningKind,
};

/// One item produced by the walker.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkItem {
    /// A regular file, format and digest still pending.
    File(FileRecord),
    /// A symbolic link (recorded, not followed).
    Symlink(SymlinkRecord),
    /// An entry that could not be read; the walk continues past it.
    Skipped(ScanWarning),
}

/// Walks a root directory and yields file record skeletons.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    config: ScanConfig,
}

impl TreeWalker {
    /// Create a walker for the given configuration.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// The configuration this walker was created with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start a new traversal from the root.
    ///
    /// Fails only for session-level problems: the root does not exist, is
    /// not a directory, cannot be listed, or the ignore patterns are invalid.
    /// Each call starts over; an iterator cannot be rewound.
    pub fn walk(&self) -> Result<RecordIter, ScanError> {
        let root = self
            .config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&self.config.root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        // An unlistable root is fatal, unlike unlistable subdirectories.
        std::fs::read_dir(&root).map_err(|e| ScanError::io(&root, e))?;

        let ignore = build_ignore_set(&self.config.ignore_patterns)?;

        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let max_depth = match self.config.scope {
            ScanScope::Recursive => usize::MAX,
            ScanScope::Flat => 1,
        };

        let walker = WalkDir::new(&root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!self.config.include_hidden)
            .follow_links(false)
            .min_depth(1)
            .max_depth(max_depth)
            .process_read_dir(move |_depth, _path, _state, children| {
                if let Some(ref set) = ignore {
                    children.retain(|child| match child {
                        Ok(entry) => !set.is_match(&entry.file_name),
                        Err(_) => true,
                    });
                }
            });

        tracing::debug!(root = %root.display(), ?max_depth, "starting traversal");

        Ok(RecordIter {
            inner: walker.into_iter(),
            root,
            pending: None,
        })
    }
}

/// Lazy iterator over walk items in deterministic (name-sorted, depth-first) order.
pub struct RecordIter {
    inner: DirEntryIter<((), ())>,
    root: PathBuf,
    pending: Option<WalkItem>,
}

impl RecordIter {
    /// Canonical root of this traversal.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn skipped(&self, err: jwalk::Error) -> WalkItem {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        unreadable(path, err.io_error(), &err)
    }

    fn symlink(&mut self, path: PathBuf) -> WalkItem {
        let target = std::fs::read_link(&path).unwrap_or_default();
        let (broken, outside_root) = match std::fs::canonicalize(&path) {
            Ok(resolved) => (false, !resolved.starts_with(&self.root)),
            Err(_) => (true, false),
        };

        if broken {
            self.pending = Some(WalkItem::Skipped(ScanWarning::broken_symlink(
                &path,
                &target.to_string_lossy(),
            )));
        } else if outside_root {
            tracing::debug!(path = %path.display(), target = %target.display(), "link leaves scan root");
        }

        WalkItem::Symlink(SymlinkRecord {
            path,
            target,
            outside_root,
            broken,
        })
    }
}

impl Iterator for RecordIter {
    type Item = WalkItem;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.pending.take() {
            return Some(item);
        }

        loop {
            let mut entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(self.skipped(err)),
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                // jwalk reports a directory it could not list on the entry itself.
                if let Some(err) = entry.read_children_error.take() {
                    return Some(unreadable(entry.path(), err.io_error(), &err));
                }
                continue;
            }

            let path = entry.path();
            if file_type.is_symlink() {
                return Some(self.symlink(path));
            }
            if !file_type.is_file() {
                tracing::debug!(path = %path.display(), "skipping special file");
                continue;
            }

            return Some(match entry.metadata() {
                Ok(metadata) => WalkItem::File(FileRecord::new(
                    path,
                    metadata.len(),
                    Timestamps::from_metadata(&metadata),
                )),
                Err(err) => unreadable(path, err.io_error(), &err),
            });
        }
    }
}

/// An `UnreadableEntry` warning for `path`, from the I/O error when there is one.
fn unreadable(path: PathBuf, io: Option<&std::io::Error>, err: &dyn std::fmt::Display) -> WalkItem {
    let warning = match io {
        Some(io) => ScanWarning::unreadable(&path, io),
        None => ScanWarning::new(&path, err.to_string(), WarningKind::UnreadableEntry),
    };
    tracing::warn!(path = %warning.path.display(), "{}", warning.message);
    WalkItem::Skipped(warning)
}

/// Compile ignore patterns into a glob set, `None` when there are none.
fn build_ignore_set(patterns: &[String]) -> Result<Option<GlobSet>, ScanError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
            message: format!("invalid ignore pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.log"), "another file here").unwrap();

        temp
    }

    fn files(walker: &TreeWalker) -> Vec<FileRecord> {
        walker
            .walk()
            .unwrap()
            .filter_map(|item| match item {
                WalkItem::File(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_basic_walk() {
        let temp = create_test_tree();
        let walker = TreeWalker::new(ScanConfig::new(temp.path()));

        let records = files(&walker);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.path.is_absolute()));
        assert!(records.iter().all(|r| r.format.is_none() && r.digest.is_none()));

        let file1 = records.iter().find(|r| r.name() == "file1.txt").unwrap();
        assert_eq!(file1.size, 5);
    }

    #[test]
    fn test_flat_scope() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .scope(ScanScope::Flat)
            .build()
            .unwrap();

        let records = files(&TreeWalker::new(config));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "file1.txt");
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["dir1".to_string(), "*.log".to_string()])
            .build()
            .unwrap();

        let records = files(&TreeWalker::new(config));
        let names: Vec<String> = records.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["file1.txt".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["[unclosed".to_string()])
            .build()
            .unwrap();

        let result = TreeWalker::new(config).walk();
        assert!(matches!(result, Err(ScanError::InvalidConfig { .. })));
    }

    #[test]
    fn test_unreadable_maps_io_error() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let item = unreadable(PathBuf::from("/media/cd/locked"), Some(&denied), &denied);
        match item {
            WalkItem::Skipped(warning) => {
                assert_eq!(warning.kind, WarningKind::UnreadableEntry);
                assert_eq!(warning.path, PathBuf::from("/media/cd/locked"));
            }
            other => panic!("expected a skipped entry, got {other:?}"),
        }

        let item = unreadable(PathBuf::from("/media/cd/x"), None, &"listing failed");
        assert!(matches!(
            item,
            WalkItem::Skipped(ScanWarning { kind: WarningKind::UnreadableEntry, .. })
        ));
    }

    #[test]
    fn test_hidden_files() {
        let temp = create_test_tree();
        fs::write(temp.path().join(".hidden"), "x").unwrap();

        let all = files(&TreeWalker::new(ScanConfig::new(temp.path())));
        assert_eq!(all.len(), 5);

        let config = ScanConfig::builder()
            .root(temp.path())
            .include_hidden(false)
            .build()
            .unwrap();
        assert_eq!(files(&TreeWalker::new(config)).len(), 4);
    }
}
