//! Top-level entry points: extract typed objects from plain data and dump
//! them back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::read_config_file;
use crate::context::{Context, ContextOptions};
use crate::decl::TypeDecl;
use crate::handler::{root_collection, HandlerCollection};
use crate::value::Value;
use crate::Error;

/// What to extract from: a file to parse, or an already parsed value.
#[derive(Debug, Clone)]
pub enum Input {
    File(PathBuf),
    Data(Value),
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Data(value)
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Input::File(path)
    }
}

impl From<&Path> for Input {
    fn from(path: &Path) -> Self {
        Input::File(path.to_path_buf())
    }
}

/// Settings for a single extract or dump call.
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct Extractor {
    handlers: Option<Arc<HandlerCollection>>,
    filename: Option<PathBuf>,
    avoid_copy: bool,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handlers(mut self, handlers: Arc<HandlerCollection>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Filename reported for data passed in directly.
    pub fn with_filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.filename = Some(filename.as_ref().to_path_buf());
        self
    }

    pub fn avoid_copy(mut self, avoid_copy: bool) -> Self {
        self.avoid_copy = avoid_copy;
        self
    }

    /// Loads `input` as `decl`.
    ///
    /// A file input is parsed according to its suffix and its path becomes
    /// the filename of the root context.
    pub fn extract(&self, decl: &TypeDecl, input: impl Into<Input>) -> Result<Value, Error> {
        let (data, filename) = match input.into() {
            Input::File(path) => (read_config_file(&path)?, Some(path)),
            Input::Data(value) => (value, self.filename.clone()),
        };
        debug!(%decl, filename = ?filename, "extracting");
        let context = self.root_context(filename)?;
        context.handlers().load(decl, &data, Some(&context))
    }

    /// Dumps `obj` as `decl` into plain data.
    pub fn dump(&self, decl: &TypeDecl, obj: &Value) -> Result<Value, Error> {
        debug!(%decl, "dumping");
        let context = self.root_context(self.filename.clone())?;
        context.handlers().dump(decl, obj, Some(&context))
    }

    fn root_context(&self, filename: Option<PathBuf>) -> Result<Context, Error> {
        let handlers = self.handlers.clone().unwrap_or_else(root_collection);
        let mut options = ContextOptions::new()
            .with_handlers(handlers)
            .avoid_copy(self.avoid_copy);
        if let Some(filename) = filename {
            options = options.with_filename(filename);
        }
        Context::root(None, options)
    }
}

/// Loads `input` as `decl` with the process-wide handler collection.
pub fn extract(decl: &TypeDecl, input: impl Into<Input>) -> Result<Value, Error> {
    Extractor::new().extract(decl, input)
}

/// Dumps `obj` as `decl` with the process-wide handler collection.
pub fn dump(decl: &TypeDecl, obj: &Value) -> Result<Value, Error> {
    Extractor::new().dump(decl, obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::schema::{Field, Schema};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use tempfile::Builder;

    fn host_schema() -> Arc<Schema> {
        Schema::builder("Host")
            .field("host", Field::new(TypeDecl::STRING))
            .build()
    }

    #[test]
    fn test_extract_from_file() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"host": "example.com"}}"#).unwrap();

        let loaded = extract(&TypeDecl::schema(&host_schema()), file.path()).unwrap();
        let instance = loaded.as_instance().unwrap();
        assert_eq!(instance.get("host"), Some(&Value::from("example.com")));
        let origin = instance.load_context().unwrap();
        assert!(origin.path.is_empty());
        assert_eq!(origin.filename.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_extract_toml_datetime_into_string_field() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "host = \"example.com\"\nsince = 1979-05-27T07:32:00Z").unwrap();

        let schema = Schema::builder("Host")
            .field("host", Field::new(TypeDecl::STRING))
            .field("since", Field::new(TypeDecl::STRING))
            .build();
        let loaded = extract(&TypeDecl::schema(&schema), file.path()).unwrap();
        assert_eq!(
            loaded.get("since"),
            Some(&Value::from("1979-05-27T07:32:00Z"))
        );
    }

    #[test]
    fn test_extract_missing_file() {
        let err = extract(&TypeDecl::STRING, Path::new("/nonexistent/data.yml")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_avoid_copy_shares_storage() {
        let data = Value::from(json!({"a": [1]}));
        let loaded = Extractor::new()
            .avoid_copy(true)
            .extract(&TypeDecl::MAPPING, data.clone())
            .unwrap();
        assert!(loaded.shares_storage(&data));

        let loaded = extract(&TypeDecl::MAPPING, data.clone()).unwrap();
        assert!(!loaded.shares_storage(&data));
    }

    #[test]
    fn test_custom_collection_is_used() {
        let empty = Arc::new(HandlerCollection::new());
        let err = Extractor::new()
            .with_handlers(empty)
            .extract(&TypeDecl::STRING, Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, Error::Unresolved(_)));
    }

    #[test]
    fn test_dump_rejects_wrong_schema() {
        let other = Schema::builder("Other").build();
        let instance = other.construct(Vec::new(), Default::default()).unwrap();
        let err = dump(&TypeDecl::schema(&host_schema()), &Value::from(instance)).unwrap_err();
        assert_eq!(err.to_string(), "<root>: expected Host, got Other");
    }
}
