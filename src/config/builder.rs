use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::env::EnvSource;
use super::file::FileSource;
use super::resolve::resolve_references;
use super::source::{merge_at_path, ConfigSource, ValueSource};
use super::ConfigError;
use crate::decl::TypeDecl;
use crate::extract::Extractor;
use crate::handler::HandlerCollection;
use crate::value::{Mapping, Value};
use crate::Error;

/// Builder for loading configuration from layered sources and extracting it
/// into a declared type.
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested mappings are merged recursively; other values
/// (including sequences) are replaced entirely.
///
/// ## Variable References
///
/// String values can reference other config values using `${path.to.field}` syntax:
///
/// ```yaml
/// server:
///   host: localhost
///   port: 8080
///   url: "http://${server.host}:${server.port}/api"
/// ```
///
/// Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).
///
/// ## Example
///
/// ```no_run
/// use dragon_extract::{Config, Field, Schema, TypeDecl};
///
/// let server = Schema::builder("Server")
///     .field("host", Field::new(TypeDecl::STRING))
///     .field("port", Field::new(TypeDecl::INTEGER).with_default(8080))
///     .build();
///
/// let config = Config::builder()
///     .with_file("config/default.yml", true)
///     .with_env("MYAPP", "__")
///     .with_file("config/local.yml", false)
///     .extract(&TypeDecl::schema(&server))?;
/// # Ok::<(), dragon_extract::Error>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() or .extract() is called"]
pub struct Config {
    sources: Vec<Box<dyn ConfigSource>>,
    handlers: Option<Arc<HandlerCollection>>,
    avoid_copy: bool,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a JSON, YAML or TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Loads configuration from environment variables with the given prefix.
    ///
    /// Environment variables are mapped to config paths by:
    /// 1. Removing the prefix and separator
    /// 2. Splitting remaining segments on the separator
    /// 3. Converting path segments to lowercase
    ///
    /// Values are read as YAML scalars (see [`EnvSource`]), falling back to
    /// the raw string.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds an in-memory value, merged at the root.
    pub fn with_value(self, value: impl Into<Value>) -> Self {
        self.with_source(ValueSource::new(value))
    }

    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Uses `handlers` instead of the process-wide collection for extraction.
    pub fn with_handlers(mut self, handlers: Arc<HandlerCollection>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn avoid_copy(mut self, avoid_copy: bool) -> Self {
        self.avoid_copy = avoid_copy;
        self
    }

    /// Loads, merges and resolves all sources into one plain mapping.
    pub fn build(self) -> Result<Value, ConfigError> {
        self.merge().map(|(value, _)| value)
    }

    /// Builds the configuration and loads it as `decl`.
    ///
    /// The last file that contributed data is recorded as the filename of
    /// the root context.
    pub fn extract(self, decl: &TypeDecl) -> Result<Value, Error> {
        let mut extractor = Extractor::new().avoid_copy(self.avoid_copy);
        if let Some(handlers) = &self.handlers {
            extractor = extractor.with_handlers(Arc::clone(handlers));
        }
        let (data, filename) = self.merge()?;
        if let Some(filename) = filename {
            extractor = extractor.with_filename(filename);
        }
        extractor.extract(decl, data)
    }

    fn merge(self) -> Result<(Value, Option<PathBuf>), ConfigError> {
        let mut merged = Mapping::new();
        let mut filename = None;

        for source in &self.sources {
            let entries = source.entries()?;
            if entries.is_empty() {
                continue;
            }
            debug!(?source, entries = entries.len(), "merging config source");
            if let Some(origin) = source.origin() {
                filename = Some(origin.to_path_buf());
            }
            for entry in entries {
                merge_at_path(&mut merged, &entry.path, entry.value);
            }
        }

        // Resolve ${...} references after all sources are merged
        resolve_references(&mut merged)?;

        Ok((Value::from(merged), filename))
    }
}
