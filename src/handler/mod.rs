//! Type handlers and the registry that resolves declarations to them.
//!
//! A [`TypeMatcher`] inspects a [`TypeDecl`] and, if it understands it,
//! produces a [`TypeHandler`] that loads plain data into objects and dumps
//! objects back into plain data. A [`HandlerCollection`] keeps matchers in
//! registration order and the first match wins.

mod basic;
mod generic;
mod inherit_key;
mod partial;

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::context::{Context, ContextOptions};
use crate::decl::TypeDecl;
use crate::value::Value;
use crate::Error;

pub use basic::{BasicHandler, BasicMatcher};
pub use generic::{GenericHandler, GenericKind, GenericMatcher, WildcardHandler};
pub use inherit_key::InheritKeyHandler;
pub use partial::{PartialHandler, PartialMatcher};

/// Converts values of one declared type between plain data and objects.
pub trait TypeHandler: fmt::Debug + Send + Sync {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error>;

    fn dump(&self, obj: &Value, context: &Context) -> Result<Value, Error>;
}

/// Produces a handler for the declarations it recognizes.
pub trait TypeMatcher: Send + Sync + 'static {
    fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>>;
}

/// Selects which half of a handler a shared code path drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Dump,
}

impl Operation {
    pub fn apply(
        self,
        handler: &dyn TypeHandler,
        value: &Value,
        context: &Context,
    ) -> Result<Value, Error> {
        match self {
            Operation::Load => handler.load(value, context),
            Operation::Dump => handler.dump(value, context),
        }
    }
}

struct Registered {
    id: TypeId,
    name: &'static str,
    matcher: Box<dyn TypeMatcher>,
}

impl Registered {
    fn new<M: TypeMatcher>(matcher: M) -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
            matcher: Box::new(matcher),
        }
    }
}

/// An ordered, append-only set of type matchers.
#[derive(Default)]
pub struct HandlerCollection {
    matchers: RwLock<Vec<Registered>>,
}

impl HandlerCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection with the basic, generic and partial matchers
    /// registered in that order.
    pub fn with_builtins() -> Self {
        Self {
            matchers: RwLock::new(vec![
                Registered::new(BasicMatcher),
                Registered::new(GenericMatcher),
                Registered::new(PartialMatcher),
            ]),
        }
    }

    /// Appends a matcher. Each matcher type may be registered once.
    pub fn register<M: TypeMatcher>(&self, matcher: M) -> Result<(), Error> {
        let mut matchers = self.matchers.write().unwrap_or_else(PoisonError::into_inner);
        if matchers.iter().any(|m| m.id == TypeId::of::<M>()) {
            return Err(Error::DuplicateHandler(type_name::<M>()));
        }
        debug!(matcher = type_name::<M>(), "registering type handler");
        matchers.push(Registered::new(matcher));
        Ok(())
    }

    /// Names of the registered matchers, in resolution order.
    pub fn matcher_names(&self) -> Vec<&'static str> {
        let matchers = self.matchers.read().unwrap_or_else(PoisonError::into_inner);
        matchers.iter().map(|m| m.name).collect()
    }

    /// Resolves a declaration to its handler.
    pub fn resolve(&self, decl: &TypeDecl) -> Result<Arc<dyn TypeHandler>, Error> {
        match decl {
            TypeDecl::Handler(handler) => return Ok(Arc::clone(handler)),
            TypeDecl::InheritKey => return Ok(Arc::new(InheritKeyHandler)),
            TypeDecl::Wildcard(key, value) => {
                return Ok(Arc::new(WildcardHandler::new(
                    key.as_ref().clone(),
                    value.as_ref().clone(),
                )))
            }
            _ => {}
        }
        let matchers = self.matchers.read().unwrap_or_else(PoisonError::into_inner);
        for registered in matchers.iter() {
            if let Some(handler) = registered.matcher.matches(decl) {
                trace!(%decl, matcher = registered.name, "resolved type declaration");
                return Ok(handler);
            }
        }
        Err(Error::Unresolved(decl.to_string()))
    }

    /// Loads `data` as `decl`. Without a context, a root context bound to
    /// this collection is created.
    pub fn load(
        self: &Arc<Self>,
        decl: &TypeDecl,
        data: &Value,
        context: Option<&Context>,
    ) -> Result<Value, Error> {
        self.run(Operation::Load, decl, data, context)
    }

    /// Dumps `obj` as `decl`, the structural inverse of [`load`](Self::load).
    pub fn dump(
        self: &Arc<Self>,
        decl: &TypeDecl,
        obj: &Value,
        context: Option<&Context>,
    ) -> Result<Value, Error> {
        self.run(Operation::Dump, decl, obj, context)
    }

    fn run(
        self: &Arc<Self>,
        op: Operation,
        decl: &TypeDecl,
        value: &Value,
        context: Option<&Context>,
    ) -> Result<Value, Error> {
        let owned;
        let context = match context {
            Some(context) => {
                if !Arc::ptr_eq(self, &context.handlers()) {
                    return Err(Error::ForeignContext);
                }
                context
            }
            None => {
                owned = Context::root(
                    None,
                    ContextOptions::new().with_handlers(Arc::clone(self)),
                )?;
                &owned
            }
        };
        let handler = self.resolve(decl)?;
        op.apply(handler.as_ref(), value, context).map_err(|err| match err {
            Error::IgnoreField => context.value_error("value can not be ignored at this position"),
            err => err,
        })
    }
}

impl fmt::Debug for HandlerCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCollection")
            .field("matchers", &self.matcher_names())
            .finish()
    }
}

/// The process-wide collection used when no other is supplied.
pub fn root_collection() -> Arc<HandlerCollection> {
    static ROOT: OnceLock<Arc<HandlerCollection>> = OnceLock::new();
    Arc::clone(ROOT.get_or_init(|| Arc::new(HandlerCollection::with_builtins())))
}

/// Registers a matcher with the process-wide collection.
pub fn register_type_handler<M: TypeMatcher>(matcher: M) -> Result<(), Error> {
    root_collection().register(matcher)
}

/// Resolves a declaration using the process-wide collection.
pub fn resolve_type_decl(decl: &TypeDecl) -> Result<Arc<dyn TypeHandler>, Error> {
    root_collection().resolve(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Schema};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Upper;

    impl TypeHandler for Upper {
        fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
            match data {
                Value::String(s) => Ok(Value::from(s.to_uppercase())),
                other => Err(context.type_error(other.type_name(), "string")),
            }
        }

        fn dump(&self, obj: &Value, _context: &Context) -> Result<Value, Error> {
            Ok(obj.clone())
        }
    }

    struct UpperMatcher;

    impl TypeMatcher for UpperMatcher {
        fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
            match decl {
                TypeDecl::Named(name) if name == "upper" => Some(Arc::new(Upper)),
                _ => None,
            }
        }
    }

    struct ShadowStrings;

    impl TypeMatcher for ShadowStrings {
        fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
            matches!(decl, TypeDecl::Scalar(_)).then(|| Arc::new(Upper) as Arc<dyn TypeHandler>)
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let collection = HandlerCollection::new();
        collection.register(UpperMatcher).unwrap();
        assert!(matches!(
            collection.register(UpperMatcher),
            Err(Error::DuplicateHandler(_))
        ));
        assert!(matches!(
            HandlerCollection::with_builtins().register(BasicMatcher),
            Err(Error::DuplicateHandler(_))
        ));
    }

    #[test]
    fn test_unresolved_declaration() {
        let collection = HandlerCollection::with_builtins();
        let err = collection.resolve(&TypeDecl::named("upper")).unwrap_err();
        assert_eq!(err.to_string(), "no type handler available for upper");
    }

    #[test]
    fn test_registration_order_decides() {
        let first = Arc::new(HandlerCollection::new());
        first.register(ShadowStrings).unwrap();
        first.register(BasicMatcher).unwrap();
        let loaded = first
            .load(&TypeDecl::STRING, &Value::from("abc"), None)
            .unwrap();
        assert_eq!(loaded, Value::from("ABC"));

        let second = Arc::new(HandlerCollection::new());
        second.register(BasicMatcher).unwrap();
        second.register(ShadowStrings).unwrap();
        let loaded = second
            .load(&TypeDecl::STRING, &Value::from("abc"), None)
            .unwrap();
        assert_eq!(loaded, Value::from("abc"));
    }

    #[test]
    fn test_handler_instances_pass_through() {
        let collection = HandlerCollection::new();
        let handler = collection.resolve(&TypeDecl::handler(Upper)).unwrap();
        assert_eq!(format!("{handler:?}"), "Upper");
        assert!(collection.resolve(&TypeDecl::InheritKey).is_ok());
    }

    #[test]
    fn test_foreign_context_rejected() {
        let ours = Arc::new(HandlerCollection::with_builtins());
        let context = Context::mkroot(ContextOptions::new());
        let err = ours
            .load(&TypeDecl::STRING, &Value::from("x"), Some(&context))
            .unwrap_err();
        assert!(matches!(err, Error::ForeignContext));
    }

    #[test]
    fn test_custom_matcher_inside_schema() {
        let collection = Arc::new(HandlerCollection::with_builtins());
        collection.register(UpperMatcher).unwrap();
        let schema = Schema::builder("Greeting")
            .field("word", Field::new(TypeDecl::named("upper")))
            .build();
        let data = Value::mapping([("word", Value::from("hi"))]);
        let loaded = collection
            .load(&TypeDecl::schema(&schema), &data, None)
            .unwrap();
        assert_eq!(loaded.get("word"), Some(&Value::from("HI")));
    }

    #[test]
    fn test_stray_ignore_signal_becomes_value_error() {
        let collection = Arc::new(HandlerCollection::with_builtins());
        let err = collection
            .dump(&TypeDecl::InheritKey, &Value::from("x"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Value { .. }));
    }
}
