use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Field, Schema};
use crate::value::{Key, Value};
use crate::Error;

/// Where an instance was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadContext {
    pub path: Vec<Key>,
    pub filename: Option<PathBuf>,
}

/// A schema value holding one [`Value`] per field.
///
/// Equality compares the schema identity and the field values. The load
/// context is not compared.
#[derive(Clone)]
pub struct Instance {
    schema: Arc<Schema>,
    values: Vec<Value>,
    load_context: Option<LoadContext>,
}

impl Instance {
    pub(super) fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        Self {
            schema,
            values,
            load_context: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of the field stored under `dest`.
    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.schema.position(dest).map(|index| &self.values[index])
    }

    pub fn set(&mut self, dest: &str, value: impl Into<Value>) -> Result<(), Error> {
        let index = self
            .schema
            .position(dest)
            .ok_or_else(|| Error::UnexpectedArgument(dest.to_owned()))?;
        self.values[index] = value.into();
        Ok(())
    }

    /// Fields paired with their values, in creation order.
    pub fn fields(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(&self.values)
    }

    /// The context this instance was loaded in, if it came from a load.
    pub fn load_context(&self) -> Option<&LoadContext> {
        self.load_context.as_ref()
    }

    pub(crate) fn set_load_context(&mut self, context: LoadContext) {
        self.load_context = Some(context);
    }

    pub(crate) fn deep_copy(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            values: self.values.iter().map(Value::deep_copy).collect(),
            load_context: self.load_context.clone(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.values == other.values
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema.name())?;
        f.debug_map()
            .entries(self.fields().map(|(field, value)| (field.dest(), value)))
            .finish()
    }
}
