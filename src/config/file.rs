//! File-based configuration source.
//!
//! The format is picked from the file suffix: `.yml` and `.yaml` are YAML,
//! `.toml` is TOML, and anything else is JSON.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;
use crate::value::Value;

/// Serialization formats understood by the file loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Infers the format from the suffix of `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            Some("cson") => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
            _ => Ok(Format::Json),
        }
    }

    /// Parses `contents`; `path` is only used for error reporting.
    pub fn parse(self, contents: &str, path: &Path) -> Result<Value, ConfigError> {
        match self {
            Format::Json => serde_json::from_str(contents).map_err(|e| ConfigError::JsonParseError {
                path: path.to_path_buf(),
                source: e,
            }),
            Format::Yaml => serde_yaml::from_str(contents).map_err(|e| ConfigError::YamlParseError {
                path: path.to_path_buf(),
                source: e,
            }),
            Format::Toml => toml::from_str(contents).map_err(|e| ConfigError::TomlParseError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

/// A configuration source that loads from a JSON, YAML or TOML file.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist are silently skipped.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// Creates a new file source.
    ///
    /// If `required` is true, the build will fail if the file doesn't exist.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }
}

impl ConfigSource for FileSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        match load_config_file(&self.path, self.required)? {
            Some(value) => Ok(vec![ConfigEntry::root(value)]),
            None => Ok(vec![]),
        }
    }

    fn origin(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Reads and parses a config file that must exist.
pub fn read_config_file(path: &Path) -> Result<Value, ConfigError> {
    load_config_file(path, true)?.ok_or(ConfigError::NoData)
}

/// Loads and parses a config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<Value>, ConfigError> {
    let format = Format::from_path(path)?;
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            debug!(path = %path.display(), ?format, "loading config file");
            format.parse(&contents, path).map(Some)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                debug!(path = %path.display(), "skipping missing optional config file");
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
