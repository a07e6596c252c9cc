use std::path::PathBuf;

use thiserror::Error;

/// Failures of the external signature tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be located.
    #[error("{tool} executable not found: {message}")]
    ExecutableNotFound { tool: String, message: String },

    /// The signature file does not exist.
    #[error("signature file not found: {path}")]
    SignatureFileMissing { path: PathBuf },

    /// The process could not be started.
    #[error("failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("{tool} exited with code {code}: {stderr}")]
    ExitStatus {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// Output could not be parsed.
    #[error("malformed {tool} output: {message}")]
    MalformedOutput { tool: String, message: String },

    /// The tool reported an error for the file itself.
    #[error("{tool} reported: {message}")]
    Reported { tool: String, message: String },
}
