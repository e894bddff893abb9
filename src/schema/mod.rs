//! Declarative schemas: named aggregates of [`Field`]s.
//!
//! A schema's field table is derived once, when [`SchemaBuilder::build`] runs.
//! Fields are inherited from every base in order. When two fields share an
//! external name, the last-declared one wins. The survivors are sorted by
//! creation index.

mod field;
mod instance;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::value::{Mapping, Value};
use crate::Error;

pub use field::{Field, FieldDefault};
pub use instance::{Instance, LoadContext};

pub struct Schema {
    name: String,
    bases: Vec<Arc<Schema>>,
    fields: Vec<Field>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            bases: Vec::new(),
            declared: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<Schema>] {
        &self.bases
    }

    /// Merged fields in creation order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by destination name.
    pub fn field(&self, dest: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.dest() == dest)
    }

    pub(crate) fn position(&self, dest: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.dest() == dest)
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subschema_of(&self, other: &Schema) -> bool {
        std::ptr::eq(self, other) || self.bases.iter().any(|base| base.is_subschema_of(other))
    }

    /// Builds an instance from positional and keyword arguments.
    ///
    /// Positional arguments map onto fields in creation order. Missing
    /// fields take their default, and fail if they are required.
    pub fn construct(
        self: &Arc<Self>,
        args: Vec<Value>,
        mut kwargs: Mapping,
    ) -> Result<Instance, Error> {
        let argcount = args.len() + kwargs.len();
        if argcount > self.fields.len() {
            return Err(Error::TooManyArguments {
                max: self.fields.len(),
                got: argcount,
            });
        }
        for (field, arg) in self.fields.iter().zip(args) {
            if kwargs.contains_key(field.dest()) {
                return Err(Error::DuplicateArgument(field.dest().to_owned()));
            }
            kwargs.insert(field.dest().to_owned(), arg);
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match kwargs.shift_remove(field.dest()) {
                Some(value) => values.push(value),
                None if field.required() => {
                    return Err(Error::MissingArgument(field.dest().to_owned()))
                }
                None => values.push(field.get_default()?),
            }
        }
        if let Some(unexpected) = kwargs.keys().next() {
            return Err(Error::UnexpectedArgument(unexpected.clone()));
        }
        Ok(Instance::new(Arc::clone(self), values))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field(
                "fields",
                &self.fields.iter().map(Field::dest).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collects bases and declared fields for a new [`Schema`].
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct SchemaBuilder {
    name: String,
    bases: Vec<Arc<Schema>>,
    declared: Vec<Field>,
}

impl SchemaBuilder {
    /// Inherits the fields of `base`. Later bases override earlier ones.
    pub fn extends(mut self, base: &Arc<Schema>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// Declares a field stored under `dest`.
    pub fn field(mut self, dest: impl Into<String>, mut field: Field) -> Self {
        field.dest = dest.into();
        self.declared.push(field);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        let mut fields: Vec<Field> = self
            .bases
            .iter()
            .flat_map(|base| base.fields.iter().cloned())
            .chain(self.declared)
            .collect();

        // Collapse from the right so overriding fields win.
        let mut seen = HashSet::new();
        fields.reverse();
        fields.retain(|field| seen.insert(field.name().to_owned()));
        fields.reverse();

        for field in &mut fields {
            if field.owner.is_some() {
                *field = field.duplicate();
            }
            field.owner = Some(self.name.clone());
        }
        fields.sort_by_key(Field::creation_index);

        trace!(schema = %self.name, fields = fields.len(), "built schema");
        Arc::new(Schema {
            name: self.name,
            bases: self.bases,
            fields,
        })
    }
}
