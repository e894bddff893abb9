//! Type-driven configuration extraction.
//!
//! Declare a [`Schema`] of [`Field`]s, then [`extract`] plain data (parsed
//! from JSON, YAML or TOML, or built in memory) into typed instances and
//! [`dump`] them back. Errors carry the dotted path of the offending node.

pub mod config;
pub mod context;
pub mod decl;
mod error;
pub mod extract;
pub mod handler;
pub mod schema;
pub mod value;

pub use config::{Config, ConfigError};
pub use context::{Context, ContextOptions};
pub use decl::{ScalarKind, TypeDecl};
pub use error::Error;
pub use extract::{dump, extract, Extractor, Input};
pub use handler::{
    register_type_handler, resolve_type_decl, HandlerCollection, TypeHandler, TypeMatcher,
};
pub use schema::{Field, FieldDefault, Instance, LoadContext, Schema};
pub use value::{Key, Mapping, Value};
