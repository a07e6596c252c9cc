//! Format identification: signature tool first, heuristic fallback.

use std::path::Path;
use std::sync::Arc;

use archivizm_core::{FileRecord, FormatResult, ScanWarning, ToolStatus};

use crate::config::IdentifyConfig;
use crate::magic;
use crate::permits::ToolPermits;
use crate::siegfried::{Siegfried, SignatureTool};

/// Outcome of identifying one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Always present; `Unrecognized` when nothing matched.
    pub result: FormatResult,
    /// Per-file problem encountered on the way, if any.
    pub warning: Option<ScanWarning>,
}

/// Classifies files. Safe to share across worker threads.
#[derive(Clone)]
pub struct FormatIdentifier {
    tool: Option<Arc<dyn SignatureTool>>,
    status: ToolStatus,
    permits: ToolPermits,
}

impl std::fmt::Debug for FormatIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatIdentifier")
            .field("status", &self.status)
            .field("permits", &self.permits.capacity())
            .finish()
    }
}

impl FormatIdentifier {
    /// Resolve siegfried from configuration, degrading to heuristics when
    /// the executable or signature file is missing.
    pub fn new(config: &IdentifyConfig) -> Self {
        if !config.use_tool {
            return Self::without_tool("signature tool disabled", config.max_tool_processes);
        }

        match Siegfried::locate(config) {
            Ok(sf) => Self::with_tool(sf, config.max_tool_processes),
            Err(e) => {
                tracing::warn!("signature tool unavailable, using heuristics only: {e}");
                Self::without_tool(e.to_string(), config.max_tool_processes)
            }
        }
    }

    /// Use a specific tool implementation.
    pub fn with_tool(tool: impl SignatureTool + 'static, max_tool_processes: usize) -> Self {
        let status = tool.status();
        Self {
            tool: Some(Arc::new(tool)),
            status,
            permits: ToolPermits::new(max_tool_processes),
        }
    }

    /// Heuristic identification only.
    pub fn heuristic_only() -> Self {
        Self::without_tool("signature tool disabled", 1)
    }

    fn without_tool(reason: impl Into<String>, max_tool_processes: usize) -> Self {
        Self {
            tool: None,
            status: ToolStatus::Unavailable {
                reason: reason.into(),
            },
            permits: ToolPermits::new(max_tool_processes),
        }
    }

    /// Tool availability for this identifier.
    pub fn tool_status(&self) -> &ToolStatus {
        &self.status
    }

    /// Identify one file. Never fails; problems come back as a warning.
    pub fn identify(&self, path: &Path) -> Identification {
        let mut warning = None;

        if let Some(tool) = &self.tool {
            let outcome = {
                let _permit = self.permits.acquire();
                tool.identify(path)
            };
            match outcome {
                Ok(Some(result)) => {
                    tracing::debug!(path = %path.display(), label = %result.label, "identified by signature");
                    return Identification {
                        result,
                        warning: None,
                    };
                }
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "no signature match, trying heuristics");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "signature tool failed: {e}");
                    warning = Some(ScanWarning::tool_unavailable(path, e));
                }
            }
        }

        let extension = archivizm_core::extension_of(path);
        let sniffed = match magic::read_header(path) {
            Ok(header) => magic::sniff(&header, extension.as_deref()),
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read header: {e}");
                warning.get_or_insert_with(|| ScanWarning::unreadable(path, &e));
                None
            }
        };

        let result = sniffed
            .or_else(|| extension.as_deref().and_then(magic::from_extension))
            .unwrap_or_else(FormatResult::unrecognized);

        tracing::debug!(path = %path.display(), label = %result.label, method = %result.method, "identified");
        Identification { result, warning }
    }

    /// Identify a record in place, returning any warning.
    pub fn identify_record(&self, record: &mut FileRecord) -> Option<ScanWarning> {
        let Identification { result, warning } = self.identify(&record.path);
        record.format = Some(result);
        warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use archivizm_core::FormatMethod;
    use std::path::PathBuf;

    struct FixedTool(Option<FormatResult>);

    impl SignatureTool for FixedTool {
        fn status(&self) -> ToolStatus {
            ToolStatus::Available {
                executable: PathBuf::from("/bin/fixed"),
                signature_file: PathBuf::from("/sig/fixed.sig"),
            }
        }

        fn identify(&self, _path: &Path) -> Result<Option<FormatResult>, ToolError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTool;

    impl SignatureTool for BrokenTool {
        fn status(&self) -> ToolStatus {
            ToolStatus::Available {
                executable: PathBuf::from("/bin/broken"),
                signature_file: PathBuf::from("/sig/broken.sig"),
            }
        }

        fn identify(&self, _path: &Path) -> Result<Option<FormatResult>, ToolError> {
            Err(ToolError::ExitStatus {
                tool: "broken".to_string(),
                code: 2,
                stderr: "crashed".to_string(),
            })
        }
    }

    #[test]
    fn test_tool_result_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let tool_result = FormatResult::from_tool(
            "JPEG File Interchange Format",
            Some("fmt/43".into()),
            None,
            None,
            "{}".to_string(),
        );
        let identifier = FormatIdentifier::with_tool(FixedTool(Some(tool_result)), 2);

        let id = identifier.identify(&path);
        assert_eq!(id.result.method, FormatMethod::ExternalTool);
        assert!(id.warning.is_none());
        assert!(identifier.tool_status().is_available());
    }

    #[test]
    fn test_tool_failure_falls_back_with_warning() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();

        let identifier = FormatIdentifier::with_tool(BrokenTool, 1);
        let id = identifier.identify(&path);

        assert_eq!(id.result.label, "PDF");
        assert_eq!(id.result.method, FormatMethod::Heuristic);
        assert_eq!(
            id.warning.map(|w| w.kind),
            Some(archivizm_core::WarningKind::ToolUnavailable)
        );
    }

    #[test]
    fn test_extension_fallback() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("notes.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let id = FormatIdentifier::heuristic_only().identify(&path);
        assert_eq!(id.result.label, "CSV");
        assert_eq!(id.result.method, FormatMethod::Heuristic);
    }

    #[test]
    fn test_unrecognized() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("mystery");
        std::fs::write(&path, [0x00, 0x01, 0x02, 0x03]).unwrap();

        let id = FormatIdentifier::heuristic_only().identify(&path);
        assert_eq!(id.result.method, FormatMethod::Unrecognized);
        assert!(id.warning.is_none());
    }

    #[test]
    fn test_vanished_file_warns() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("gone.png");

        let id = FormatIdentifier::heuristic_only().identify(&path);
        // Extension still gives a label.
        assert_eq!(id.result.label, "PNG");
        assert!(id.warning.is_some());
    }

    #[test]
    fn test_disabled_tool_reports_unavailable() {
        let identifier = FormatIdentifier::new(&IdentifyConfig::heuristic_only());
        assert!(!identifier.tool_status().is_available());
    }
}
