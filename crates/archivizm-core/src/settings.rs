//! User settings: displayed fields, export target and tool overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

/// Errors from loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// A metadata column that can be shown or exported.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DisplayedField {
    Path,
    Name,
    Extension,
    Size,
    Created,
    Modified,
    Format,
    Method,
    Puid,
    Mime,
    Digest,
}

impl DisplayedField {
    /// Column header text.
    pub fn header(self) -> &'static str {
        match self {
            Self::Path => "Path",
            Self::Name => "Name",
            Self::Extension => "Extension",
            Self::Size => "Size",
            Self::Created => "Created",
            Self::Modified => "Modified",
            Self::Format => "Format",
            Self::Method => "Identification Method",
            Self::Puid => "PUID",
            Self::Mime => "MIME Type",
            Self::Digest => "MD5",
        }
    }

    /// Every field, in declaration order.
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

fn default_fields() -> Vec<DisplayedField> {
    vec![
        DisplayedField::Path,
        DisplayedField::Size,
        DisplayedField::Modified,
        DisplayedField::Format,
        DisplayedField::Method,
        DisplayedField::Digest,
    ]
}

/// Settings supplied by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Columns to show in results and exports.
    #[serde(default = "default_fields")]
    pub displayed_fields: Vec<DisplayedField>,

    /// Export target; the extension (`.csv`, `.json` or `.xlsx`) selects the format.
    #[serde(default)]
    pub export_path: Option<PathBuf>,

    /// Directory that relative export paths are resolved against.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Leave zero-byte files out of duplicate analysis.
    #[serde(default)]
    pub exclude_empty_duplicates: bool,

    /// Explicit path to the signature tool executable.
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Explicit path to the signature definition file.
    #[serde(default)]
    pub signature_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            displayed_fields: default_fields(),
            export_path: None,
            working_directory: None,
            exclude_empty_duplicates: false,
            tool_path: None,
            signature_file: None,
        }
    }
}

impl Settings {
    /// Default settings file location: `<config dir>/archivizm/settings.toml`.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join("archivizm").join("settings.toml"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Displayed fields with duplicates removed, first occurrence wins.
    /// Falls back to the default set when empty.
    pub fn fields(&self) -> Vec<DisplayedField> {
        let mut fields: Vec<DisplayedField> = Vec::with_capacity(self.displayed_fields.len());
        for field in &self.displayed_fields {
            if !fields.contains(field) {
                fields.push(*field);
            }
        }
        if fields.is_empty() {
            return default_fields();
        }
        fields
    }

    /// Export target, with relative paths resolved against the working directory.
    /// An explicit `target` takes precedence over `export_path`.
    pub fn resolve_export_path(&self, target: Option<&Path>) -> Option<PathBuf> {
        let path = target.map(Path::to_path_buf).or_else(|| self.export_path.clone())?;
        if path.is_relative() {
            if let Some(dir) = &self.working_directory {
                return Some(dir.join(path));
            }
        }
        Some(path)
    }
}
