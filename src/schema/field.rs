use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::decl::TypeDecl;
use crate::value::{Mapping, Value};
use crate::Error;

static CREATION_INDEX: AtomicUsize = AtomicUsize::new(0);

type Factory = Arc<dyn Fn() -> Result<Value, Error> + Send + Sync>;

/// How a field obtains its value when the data omits it.
#[derive(Clone)]
pub enum FieldDefault {
    Required,
    Value(Value),
    /// Called once per construction, so instances never share a default.
    Factory(Factory),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Required => f.write_str("Required"),
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A declared schema field.
///
/// Fields are ordered by a process-wide creation index, which decides how
/// positional arguments map onto a schema.
#[derive(Debug, Clone)]
pub struct Field {
    decl: TypeDecl,
    default: FieldDefault,
    nullable: Option<bool>,
    name: Option<String>,
    pub(super) dest: String,
    pub(super) owner: Option<String>,
    creation_index: usize,
}

impl Field {
    pub fn new(decl: TypeDecl) -> Self {
        Self {
            decl,
            default: FieldDefault::Required,
            nullable: None,
            name: None,
            dest: String::new(),
            owner: None,
            creation_index: CREATION_INDEX.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A field holding the key of the node it was loaded from.
    pub fn inherit_key() -> Self {
        Self::new(TypeDecl::InheritKey)
    }

    /// A field collecting every entry not claimed by a named field.
    pub fn wildcard(key: TypeDecl, value: TypeDecl) -> Self {
        Self::new(TypeDecl::Wildcard(Box::new(key), Box::new(value)))
            .with_factory(|| Ok(Value::from(Mapping::new())))
    }

    /// Sets a fixed default. A `Null` default makes the field nullable.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(default.into());
        self
    }

    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    /// Defaults to the zero value of the declared type.
    pub fn with_type_default(self) -> Self {
        let decl = self.decl.clone();
        self.with_factory(move || {
            decl.zero_value()
                .unwrap_or_else(|| Err(Error::NoDefault(decl.to_string())))
        })
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the external name used in data, when it differs from the
    /// destination name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn decl(&self) -> &TypeDecl {
        &self.decl
    }

    pub fn default(&self) -> &FieldDefault {
        &self.default
    }

    /// External name: the explicit name, or else the destination name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.dest)
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn creation_index(&self) -> usize {
        self.creation_index
    }

    pub fn required(&self) -> bool {
        matches!(self.default, FieldDefault::Required)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.default, FieldDefault::Value(Value::Null)) || self.nullable.unwrap_or(false)
    }

    pub fn get_default(&self) -> Result<Value, Error> {
        match &self.default {
            FieldDefault::Required => Err(Error::MissingArgument(self.dest.clone())),
            FieldDefault::Value(value) => Ok(value.clone()),
            FieldDefault::Factory(factory) => factory(),
        }
    }

    /// Copy detached from its owner, for attaching to a derived schema.
    pub(super) fn duplicate(&self) -> Self {
        Self {
            owner: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field({:?}, type={}, required={}, owner={})",
            self.name(),
            self.decl,
            self.required(),
            self.owner().unwrap_or("None")
        )
    }
}
