use std::sync::Arc;

use super::{Operation, TypeHandler, TypeMatcher};
use crate::context::Context;
use crate::decl::TypeDecl;
use crate::value::{Mapping, Value};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericKind {
    List,
    Tuple,
    Mapping,
}

/// Handles parametrized containers: lists and tuples of `T`, and mappings
/// from `K` to `V`.
///
/// Elements are processed in child contexts keyed by index or by key.
/// Elements whose handler signals [`Error::IgnoreField`] are dropped.
#[derive(Debug, Clone)]
pub struct GenericHandler {
    kind: GenericKind,
    item: TypeDecl,
    value: Option<TypeDecl>,
}

impl GenericHandler {
    pub fn list(item: TypeDecl) -> Self {
        Self {
            kind: GenericKind::List,
            item,
            value: None,
        }
    }

    pub fn tuple(item: TypeDecl) -> Self {
        Self {
            kind: GenericKind::Tuple,
            item,
            value: None,
        }
    }

    pub fn mapping(key: TypeDecl, value: TypeDecl) -> Self {
        Self {
            kind: GenericKind::Mapping,
            item: key,
            value: Some(value),
        }
    }

    pub fn kind(&self) -> GenericKind {
        self.kind
    }

    fn apply(&self, data: &Value, context: &Context, op: Operation) -> Result<Value, Error> {
        match (&self.kind, &self.value) {
            (GenericKind::Mapping, Some(value_decl)) => {
                self.apply_mapping(value_decl, data, context, op)
            }
            _ => self.apply_sequence(data, context, op),
        }
    }

    fn apply_sequence(
        &self,
        data: &Value,
        context: &Context,
        op: Operation,
    ) -> Result<Value, Error> {
        let items = data
            .as_sequence()
            .ok_or_else(|| context.type_error(data.type_name(), "sequence"))?;
        let handler = context.handlers().resolve(&self.item)?;

        let mut result = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match op.apply(handler.as_ref(), item, &context.child(index)) {
                Ok(value) => result.push(value),
                Err(Error::IgnoreField) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Value::from(result))
    }

    fn apply_mapping(
        &self,
        value_decl: &TypeDecl,
        data: &Value,
        context: &Context,
        op: Operation,
    ) -> Result<Value, Error> {
        let entries = data
            .as_mapping()
            .ok_or_else(|| context.type_error(data.type_name(), "mapping"))?;
        let handlers = context.handlers();
        let key_handler = handlers.resolve(&self.item)?;
        let value_handler = handlers.resolve(value_decl)?;

        let mut result = Mapping::with_capacity(entries.len());
        for (raw_key, value) in entries.iter() {
            let key_context = context.child(raw_key.as_str());
            let raw = Value::from(raw_key.as_str());
            let key = match op.apply(key_handler.as_ref(), &raw, &key_context) {
                Ok(Value::String(key)) => key,
                Ok(other) => return Err(key_context.type_error(other.type_name(), "string key")),
                Err(Error::IgnoreField) => continue,
                Err(err) => return Err(err),
            };
            drop(key_context);
            match op.apply(value_handler.as_ref(), value, &context.child(key.as_str())) {
                Ok(value) => {
                    result.insert(key, value);
                }
                Err(Error::IgnoreField) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Value::from(result))
    }
}

impl TypeHandler for GenericHandler {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
        self.apply(data, context, Operation::Load)
    }

    fn dump(&self, obj: &Value, context: &Context) -> Result<Value, Error> {
        self.apply(obj, context, Operation::Dump)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GenericMatcher;

impl TypeMatcher for GenericMatcher {
    fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
        let handler = match decl {
            TypeDecl::SequenceOf(item) => GenericHandler::list(item.as_ref().clone()),
            TypeDecl::TupleOf(item) => GenericHandler::tuple(item.as_ref().clone()),
            TypeDecl::MappingOf(key, value) => {
                GenericHandler::mapping(key.as_ref().clone(), value.as_ref().clone())
            }
            _ => return None,
        };
        Some(Arc::new(handler))
    }
}

/// Mapping handler for the entries a schema's named fields leave unclaimed.
///
/// Only reachable through [`TypeDecl::Wildcard`], never matched from a plain
/// container declaration.
#[derive(Debug, Clone)]
pub struct WildcardHandler {
    inner: GenericHandler,
}

impl WildcardHandler {
    pub fn new(key: TypeDecl, value: TypeDecl) -> Self {
        Self {
            inner: GenericHandler::mapping(key, value),
        }
    }
}

impl TypeHandler for WildcardHandler {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
        self.inner.load(data, context)
    }

    fn dump(&self, obj: &Value, context: &Context) -> Result<Value, Error> {
        self.inner.dump(obj, context)
    }
}
