//! External signature tool seam and the siegfried (`sf`) implementation.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use compact_str::CompactString;
use serde::Deserialize;

use archivizm_core::{FormatResult, ToolStatus};

use crate::config::{DEFAULT_TOOL_NAME, IdentifyConfig};
use crate::error::ToolError;

const TOOL: &str = "siegfried";

/// An external program that classifies files against curated signatures.
pub trait SignatureTool: Send + Sync {
    /// Availability for reporting in the session.
    fn status(&self) -> ToolStatus;

    /// Classify one file.
    ///
    /// `Ok(None)` means the tool ran but had no confident match.
    fn identify(&self, path: &Path) -> Result<Option<FormatResult>, ToolError>;
}

/// Siegfried invoked as `sf -json -home <dir> -sig <name> <file>`.
#[derive(Debug, Clone)]
pub struct Siegfried {
    executable: PathBuf,
    signature_file: PathBuf,
}

impl Siegfried {
    /// Create from known paths without checking them.
    pub fn new(executable: impl Into<PathBuf>, signature_file: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            signature_file: signature_file.into(),
        }
    }

    /// Resolve the executable and signature file from configuration.
    ///
    /// Both must exist for the tool to count as available.
    pub fn locate(config: &IdentifyConfig) -> Result<Self, ToolError> {
        let executable = match &config.tool_path {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(ToolError::ExecutableNotFound {
                    tool: TOOL.to_string(),
                    message: format!("{} is not a file", path.display()),
                });
            }
            None => which::which(DEFAULT_TOOL_NAME).map_err(|e| ToolError::ExecutableNotFound {
                tool: TOOL.to_string(),
                message: format!("`{DEFAULT_TOOL_NAME}` not on PATH: {e}"),
            })?,
        };

        let signature_file = config
            .resolved_signature_file()
            .unwrap_or_else(|| PathBuf::from("siegfried").join("default.sig"));
        if !signature_file.is_file() {
            return Err(ToolError::SignatureFileMissing {
                path: signature_file,
            });
        }

        tracing::info!(
            executable = %executable.display(),
            signature_file = %signature_file.display(),
            "signature tool available"
        );
        Ok(Self::new(executable, signature_file))
    }

    fn command(&self, path: &Path) -> Command {
        let home = self
            .signature_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let sig_name = self
            .signature_file
            .file_name()
            .unwrap_or(self.signature_file.as_os_str());

        let mut cmd = Command::new(&self.executable);
        cmd.arg("-json")
            .arg("-home")
            .arg(home)
            .arg("-sig")
            .arg(sig_name)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl SignatureTool for Siegfried {
    fn status(&self) -> ToolStatus {
        ToolStatus::Available {
            executable: self.executable.clone(),
            signature_file: self.signature_file.clone(),
        }
    }

    fn identify(&self, path: &Path) -> Result<Option<FormatResult>, ToolError> {
        let mut cmd = self.command(path);
        tracing::debug!(?cmd, "running signature tool");

        // `output` waits for the child, so no process is left behind.
        let output = cmd.output().map_err(|source| ToolError::Spawn {
            tool: TOOL.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolError::ExitStatus {
                tool: TOOL.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout).into_owned();
        parse_report(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    files: Vec<FileReport>,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    #[serde(default)]
    errors: String,
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    #[serde(default)]
    id: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    mime: String,
    #[serde(default)]
    warning: String,
}

/// Parse `sf -json` output into the first match of the first file.
pub(crate) fn parse_report(raw: &str) -> Result<Option<FormatResult>, ToolError> {
    let report: Report = serde_json::from_str(raw).map_err(|e| ToolError::MalformedOutput {
        tool: TOOL.to_string(),
        message: e.to_string(),
    })?;

    let file = report
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::MalformedOutput {
            tool: TOOL.to_string(),
            message: "no file entries".to_string(),
        })?;

    if !file.errors.trim().is_empty() {
        return Err(ToolError::Reported {
            tool: TOOL.to_string(),
            message: file.errors,
        });
    }

    let Some(found) = file.matches.into_iter().next() else {
        return Ok(None);
    };

    if found.id.eq_ignore_ascii_case("UNKNOWN") || found.format.trim().is_empty() {
        tracing::debug!(warning = %found.warning, "no confident signature match");
        return Ok(None);
    }

    Ok(Some(FormatResult::from_tool(
        found.format.as_str(),
        non_empty(found.id),
        non_empty(found.mime),
        non_empty(found.version),
        raw.to_string(),
    )))
}

fn non_empty(value: String) -> Option<CompactString> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| CompactString::from(trimmed))
}
