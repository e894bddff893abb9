use std::sync::Arc;

use super::{TypeHandler, TypeMatcher};
use crate::context::Context;
use crate::decl::{ScalarKind, TypeDecl};
use crate::value::Value;
use crate::Error;

/// Handles scalars and untyped containers.
///
/// The value is type-checked and deep-copied, unless the context asks to
/// avoid copies, in which case container storage is shared with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicHandler {
    kind: ScalarKind,
}

impl BasicHandler {
    pub fn new(kind: ScalarKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    fn check(&self, value: &Value, context: &Context) -> Result<Value, Error> {
        if !self.kind.accepts(value) {
            return Err(context.type_error(value.type_name(), self.kind.name()));
        }
        if context.avoid_copy() {
            Ok(value.clone())
        } else {
            Ok(value.deep_copy())
        }
    }
}

impl TypeHandler for BasicHandler {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
        self.check(data, context)
    }

    fn dump(&self, obj: &Value, context: &Context) -> Result<Value, Error> {
        self.check(obj, context)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicMatcher;

impl TypeMatcher for BasicMatcher {
    fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
        match decl {
            TypeDecl::Scalar(kind) => Some(Arc::new(BasicHandler::new(*kind))),
            _ => None,
        }
    }
}
