use super::TypeHandler;
use crate::context::Context;
use crate::value::{Key, Value};
use crate::Error;

/// Loads the key under which the current node sits in its parent container.
///
/// The input data is ignored. Dumping always signals
/// [`Error::IgnoreField`], so the value is never written back.
#[derive(Debug, Default, Clone, Copy)]
pub struct InheritKeyHandler;

impl TypeHandler for InheritKeyHandler {
    fn load(&self, _data: &Value, context: &Context) -> Result<Value, Error> {
        Ok(match context.key() {
            Some(Key::Name(name)) => Value::String(name),
            Some(Key::Index(index)) => Value::Integer(
                i64::try_from(index).map_err(|_| context.value_error("index out of range"))?,
            ),
            None => Value::Null,
        })
    }

    fn dump(&self, _obj: &Value, _context: &Context) -> Result<Value, Error> {
        Err(Error::IgnoreField)
    }
}
