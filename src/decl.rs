//! Type declarations understood by the handler registry.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::handler::TypeHandler;
use crate::schema::Schema;
use crate::value::{Mapping, Value};

/// Primitive and untyped container kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
    Mapping,
    Sequence,
    Tuple,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Mapping => "mapping",
            ScalarKind::Sequence => "sequence",
            ScalarKind::Tuple => "tuple",
        }
    }

    /// Whether `value` is an instance of this kind. Tuples are plain sequences
    /// in the data model.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarKind::String, Value::String(_))
                | (ScalarKind::Integer, Value::Integer(_))
                | (ScalarKind::Float, Value::Float(_))
                | (ScalarKind::Boolean, Value::Boolean(_))
                | (ScalarKind::Mapping, Value::Mapping(_))
                | (ScalarKind::Sequence | ScalarKind::Tuple, Value::Sequence(_))
        )
    }

    fn zero(self) -> Value {
        match self {
            ScalarKind::String => Value::String(String::new()),
            ScalarKind::Integer => Value::Integer(0),
            ScalarKind::Float => Value::Float(0.0),
            ScalarKind::Boolean => Value::Boolean(false),
            ScalarKind::Mapping => Value::from(Mapping::new()),
            ScalarKind::Sequence | ScalarKind::Tuple => Value::from(Vec::new()),
        }
    }
}

/// A declared type.
///
/// `Wildcard`, `InheritKey` and `Handler` stand for handler instances and are
/// resolved without consulting the registered matchers.
#[derive(Clone)]
pub enum TypeDecl {
    Scalar(ScalarKind),
    SequenceOf(Box<TypeDecl>),
    TupleOf(Box<TypeDecl>),
    MappingOf(Box<TypeDecl>, Box<TypeDecl>),
    Schema(Arc<Schema>),
    Wildcard(Box<TypeDecl>, Box<TypeDecl>),
    InheritKey,
    /// A type known only to an extension matcher.
    Named(Cow<'static, str>),
    Handler(Arc<dyn TypeHandler>),
}

impl TypeDecl {
    pub const STRING: TypeDecl = TypeDecl::Scalar(ScalarKind::String);
    pub const INTEGER: TypeDecl = TypeDecl::Scalar(ScalarKind::Integer);
    pub const FLOAT: TypeDecl = TypeDecl::Scalar(ScalarKind::Float);
    pub const BOOLEAN: TypeDecl = TypeDecl::Scalar(ScalarKind::Boolean);
    pub const MAPPING: TypeDecl = TypeDecl::Scalar(ScalarKind::Mapping);
    pub const SEQUENCE: TypeDecl = TypeDecl::Scalar(ScalarKind::Sequence);
    pub const TUPLE: TypeDecl = TypeDecl::Scalar(ScalarKind::Tuple);

    pub fn list_of(item: TypeDecl) -> Self {
        TypeDecl::SequenceOf(Box::new(item))
    }

    pub fn tuple_of(item: TypeDecl) -> Self {
        TypeDecl::TupleOf(Box::new(item))
    }

    pub fn map_of(key: TypeDecl, value: TypeDecl) -> Self {
        TypeDecl::MappingOf(Box::new(key), Box::new(value))
    }

    pub fn schema(schema: &Arc<Schema>) -> Self {
        TypeDecl::Schema(Arc::clone(schema))
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        TypeDecl::Named(name.into())
    }

    pub fn handler(handler: impl TypeHandler + 'static) -> Self {
        TypeDecl::Handler(Arc::new(handler))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, TypeDecl::Wildcard(..))
    }

    pub fn is_inherit_key(&self) -> bool {
        matches!(self, TypeDecl::InheritKey)
    }

    /// The value a default-constructed instance of this type would hold.
    ///
    /// Schemas are constructed without arguments, which fails when they have
    /// required fields. Types without a natural zero value yield `None`.
    pub fn zero_value(&self) -> Option<Result<Value, crate::Error>> {
        match self {
            TypeDecl::Scalar(kind) => Some(Ok(kind.zero())),
            TypeDecl::SequenceOf(_) | TypeDecl::TupleOf(_) => Some(Ok(Value::from(Vec::new()))),
            TypeDecl::MappingOf(..) | TypeDecl::Wildcard(..) => {
                Some(Ok(Value::from(Mapping::new())))
            }
            TypeDecl::Schema(schema) => Some(
                schema
                    .construct(Vec::new(), Mapping::new())
                    .map(Value::Instance),
            ),
            TypeDecl::InheritKey | TypeDecl::Named(_) | TypeDecl::Handler(_) => None,
        }
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecl::Scalar(kind) => f.write_str(kind.name()),
            TypeDecl::SequenceOf(item) => write!(f, "list[{item}]"),
            TypeDecl::TupleOf(item) => write!(f, "tuple[{item}]"),
            TypeDecl::MappingOf(key, value) => write!(f, "mapping[{key}, {value}]"),
            TypeDecl::Schema(schema) => f.write_str(schema.name()),
            TypeDecl::Wildcard(key, value) => write!(f, "wildcard[{key}, {value}]"),
            TypeDecl::InheritKey => f.write_str("inherit-key"),
            TypeDecl::Named(name) => f.write_str(name),
            TypeDecl::Handler(handler) => write!(f, "{handler:?}"),
        }
    }
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDecl({self})")
    }
}
