//! Identifier configuration.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Name of the siegfried executable looked up on `PATH`.
pub const DEFAULT_TOOL_NAME: &str = "sf";

/// Configuration for format identification.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IdentifyConfig {
    /// Explicit path to the `sf` executable; `PATH` lookup when unset.
    #[builder(default)]
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Explicit signature file; `$HOME/siegfried/default.sig` when unset.
    #[builder(default)]
    #[serde(default)]
    pub signature_file: Option<PathBuf>,

    /// Upper bound on concurrently running tool processes.
    #[builder(default = "default_max_tool_processes()")]
    #[serde(default = "default_max_tool_processes")]
    pub max_tool_processes: usize,

    /// Try the external tool at all. When false, identification is heuristic only.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub use_tool: bool,
}

fn default_max_tool_processes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_true() -> bool {
    true
}

impl IdentifyConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_tool_processes == Some(0) {
            return Err("max_tool_processes must be at least 1".to_string());
        }
        Ok(())
    }
}

impl IdentifyConfig {
    /// Create a new identify config builder.
    pub fn builder() -> IdentifyConfigBuilder {
        IdentifyConfigBuilder::default()
    }

    /// Configuration that never invokes the external tool.
    pub fn heuristic_only() -> Self {
        Self {
            use_tool: false,
            ..Self::default()
        }
    }

    /// Signature file to use: the explicit one, or siegfried's default location.
    pub fn resolved_signature_file(&self) -> Option<PathBuf> {
        self.signature_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join("siegfried").join("default.sig")))
    }
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            signature_file: None,
            max_tool_processes: default_max_tool_processes(),
            use_tool: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = IdentifyConfig::builder().build().unwrap();
        assert!(config.use_tool);
        assert!(config.max_tool_processes >= 1);
        assert!(config.tool_path.is_none());
    }

    #[test]
    fn test_zero_processes_rejected() {
        let result = IdentifyConfig::builder().max_tool_processes(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_signature_file_wins() {
        let config = IdentifyConfig::builder()
            .signature_file(Some(PathBuf::from("/opt/sig/archive.sig")))
            .build()
            .unwrap();
        assert_eq!(
            config.resolved_signature_file(),
            Some(PathBuf::from("/opt/sig/archive.sig"))
        );
    }

    #[test]
    fn test_heuristic_only() {
        assert!(!IdentifyConfig::heuristic_only().use_tool);
    }
}
