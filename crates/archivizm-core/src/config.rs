//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// How far below the root a scan descends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    /// Walk the whole tree.
    #[default]
    Recursive,
    /// Only the root's direct children.
    Flat,
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Traversal scope.
    #[builder(default)]
    #[serde(default)]
    pub scope: ScanScope,

    /// Glob patterns matched against entry names; matching entries
    /// (and, for directories, everything below them) are skipped.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of worker threads (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

fn default_true() -> bool {
    true
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if let Some(ref patterns) = self.ignore_patterns {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err("Ignore patterns cannot be blank".to_string());
            }
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple recursive config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: ScanScope::Recursive,
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
        }
    }

    /// Whether the walk descends below the root's direct children.
    pub fn is_recursive(&self) -> bool {
        self.scope == ScanScope::Recursive
    }

    /// Resolved worker count: `threads`, or the machine's available parallelism.
    pub fn worker_count(&self) -> usize {
        match self.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
