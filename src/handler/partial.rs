use std::collections::HashSet;
use std::sync::Arc;

use super::{TypeHandler, TypeMatcher};
use crate::context::Context;
use crate::decl::TypeDecl;
use crate::schema::{Field, Schema};
use crate::value::{Mapping, Value};
use crate::Error;

/// Maps a schema's fields against a data mapping.
///
/// On dump, the entries of a wildcard field are written back into the
/// enclosing mapping (named fields win on collision) instead of under the
/// wildcard field's own name, so the output loads back to the same instance.
#[derive(Debug, Clone)]
pub struct PartialHandler {
    schema: Arc<Schema>,
}

impl PartialHandler {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn load_field(&self, field: &Field, data: &Mapping, context: &Context) -> Result<Value, Error> {
        let handlers = context.handlers();
        if field.decl().is_inherit_key() {
            return handlers.resolve(field.decl())?.load(&Value::Null, context);
        }
        match data.get(field.name()) {
            Some(Value::Null) if field.is_nullable() => Ok(Value::Null),
            Some(raw) => handlers
                .resolve(field.decl())?
                .load(raw, &context.child(field.name())),
            None if !field.required() => field
                .get_default()
                .map_err(|err| context.value_error(err)),
            None => Err(context.value_error(format_args!(
                "missing required field {}",
                field.name()
            ))),
        }
    }
}

impl TypeHandler for PartialHandler {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
        // Pre-built instances pass through untouched.
        if let Value::Instance(instance) = data {
            if instance.schema().is_subschema_of(&self.schema) {
                return Ok(data.clone());
            }
        }
        let entries = data.as_mapping().ok_or_else(|| {
            let expected = format!("{{mapping, {}}}", self.schema.name());
            context.type_error(data.type_name(), expected)
        })?;

        let mut values = Mapping::with_capacity(self.schema.fields().len());
        let mut wildcard: Option<&Field> = None;
        for field in self.schema.fields() {
            if field.decl().is_wildcard() {
                if wildcard.replace(field).is_some() {
                    return Err(Error::MultipleWildcards(self.schema.name().to_owned()));
                }
                continue;
            }
            let value = self.load_field(field, entries, context)?;
            values.insert(field.dest().to_owned(), value);
        }

        if let Some(field) = wildcard {
            let claimed: HashSet<&str> = self
                .schema
                .fields()
                .iter()
                .filter(|f| !f.decl().is_wildcard())
                .map(Field::name)
                .collect();
            let leftover: Mapping = entries
                .iter()
                .filter(|(key, _)| !claimed.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let value = context
                .handlers()
                .resolve(field.decl())?
                .load(&Value::from(leftover), context)?;
            values.insert(field.dest().to_owned(), value);
        }

        let mut instance = self.schema.construct(Vec::new(), values)?;
        instance.set_load_context(context.snapshot());
        Ok(Value::Instance(instance))
    }

    fn dump(&self, obj: &Value, context: &Context) -> Result<Value, Error> {
        let instance = match obj {
            Value::Instance(instance) if instance.schema().is_subschema_of(&self.schema) => {
                instance
            }
            other => return Err(context.type_error(other.type_name(), self.schema.name())),
        };
        let handlers = context.handlers();

        let mut data = Mapping::new();
        let mut spill = None;
        for field in self.schema.fields() {
            let value = match instance.get(field.dest()) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let handler = handlers.resolve(field.decl())?;
            if field.decl().is_wildcard() {
                spill = Some(handler.dump(value, context)?);
                continue;
            }
            match handler.dump(value, &context.child(field.name())) {
                Ok(dumped) => {
                    data.insert(field.name().to_owned(), dumped);
                }
                Err(Error::IgnoreField) => {}
                Err(err) => return Err(err),
            }
        }

        // Wildcard entries go back to the level they were collected from.
        if let Some(Value::Mapping(extra)) = spill {
            for (key, value) in extra.iter() {
                data.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(Value::from(data))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PartialMatcher;

impl TypeMatcher for PartialMatcher {
    fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
        match decl {
            TypeDecl::Schema(schema) => Some(Arc::new(PartialHandler::new(Arc::clone(schema)))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;
    use crate::value::Key;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item_schemas() -> (Arc<Schema>, Arc<Schema>) {
        let item_data = Schema::builder("ItemData")
            .field("uri", Field::new(TypeDecl::STRING))
            .build();
        let item = Schema::builder("Item")
            .field("name", Field::new(TypeDecl::STRING))
            .field(
                "data",
                Field::new(TypeDecl::schema(&item_data)).with_default(Value::Null),
            )
            .build();
        (item_data, item)
    }

    fn load(schema: &Arc<Schema>, data: serde_json::Value) -> Result<Value, Error> {
        let context = Context::mkroot(ContextOptions::new());
        PartialHandler::new(Arc::clone(schema)).load(&Value::from(data), &context)
    }

    #[test]
    fn test_nested_load_and_dump() {
        let (_, item) = item_schemas();
        let data = json!({"name": "B", "data": {"uri": "https://x"}});
        let loaded = load(&item, data.clone()).unwrap();
        assert_eq!(loaded.get("name"), Some(&Value::from("B")));
        let nested = loaded.get("data").unwrap();
        assert_eq!(nested.get("uri"), Some(&Value::from("https://x")));
        assert_eq!(
            nested.as_instance().unwrap().load_context().unwrap().path,
            vec![Key::from("data")]
        );

        let context = Context::mkroot(ContextOptions::new());
        let dumped = PartialHandler::new(item).dump(&loaded, &context).unwrap();
        assert_eq!(dumped, Value::from(data));
    }

    #[test]
    fn test_explicit_null_on_nullable_field() {
        let (_, item) = item_schemas();
        let loaded = load(&item, json!({"name": "A", "data": null})).unwrap();
        assert_eq!(loaded.get("data"), Some(&Value::Null));

        let context = Context::mkroot(ContextOptions::new());
        let dumped = PartialHandler::new(item).dump(&loaded, &context).unwrap();
        assert_eq!(dumped, Value::from(json!({"name": "A"})));
    }

    #[test]
    fn test_null_on_required_field_is_type_error() {
        let (_, item) = item_schemas();
        let err = load(&item, json!({"name": null})).unwrap_err();
        assert_eq!(err.to_string(), "name: expected string, got null");
    }

    #[test]
    fn test_missing_required_field_at_root() {
        let schema = Schema::builder("Value")
            .field("value", Field::new(TypeDecl::STRING))
            .build();
        let err = load(&schema, json!({})).unwrap_err();
        assert_eq!(err.path(), Some("<root>"));
        assert_eq!(err.to_string(), "<root>: missing required field value");
    }

    #[test]
    fn test_rejects_non_mapping() {
        let (_, item) = item_schemas();
        let err = load(&item, json!(["a"])).unwrap_err();
        assert_eq!(err.to_string(), "<root>: expected {mapping, Item}, got sequence");
    }

    #[test]
    fn test_instances_pass_through() {
        let (item_data, _) = item_schemas();
        let instance = item_data
            .construct(vec![Value::from("https://x")], Mapping::new())
            .unwrap();
        let value = Value::Instance(instance);
        let context = Context::mkroot(ContextOptions::new());
        let loaded = PartialHandler::new(item_data).load(&value, &context).unwrap();
        assert_eq!(loaded, value);
        assert!(loaded.as_instance().unwrap().load_context().is_none());
    }

    #[test]
    fn test_wildcard_collects_leftovers_and_flattens_on_dump() {
        let schema = Schema::builder("Env")
            .field("name", Field::new(TypeDecl::STRING))
            .field("vars", Field::wildcard(TypeDecl::STRING, TypeDecl::INTEGER))
            .build();
        let data = json!({"name": "prod", "a": 1, "b": 2});
        let loaded = load(&schema, data.clone()).unwrap();
        assert_eq!(loaded.get("vars"), Some(&Value::from(json!({"a": 1, "b": 2}))));

        let context = Context::mkroot(ContextOptions::new());
        let dumped = PartialHandler::new(schema).dump(&loaded, &context).unwrap();
        assert_eq!(dumped, Value::from(data));
    }

    #[test]
    fn test_wildcard_values_are_type_checked() {
        let schema = Schema::builder("Env")
            .field("vars", Field::wildcard(TypeDecl::STRING, TypeDecl::INTEGER))
            .build();
        let err = load(&schema, json!({"a": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "a: expected integer, got string");
    }

    #[test]
    fn test_multiple_wildcards_rejected_at_load() {
        let schema = Schema::builder("Broken")
            .field("one", Field::wildcard(TypeDecl::STRING, TypeDecl::STRING))
            .field("two", Field::wildcard(TypeDecl::STRING, TypeDecl::STRING))
            .build();
        assert_eq!(schema.fields().len(), 2);
        let err = load(&schema, json!({})).unwrap_err();
        assert!(matches!(err, Error::MultipleWildcards(name) if name == "Broken"));
    }

    #[test]
    fn test_inherit_key_from_mapping() {
        let server = Schema::builder("Server")
            .field("name", Field::inherit_key())
            .field("port", Field::new(TypeDecl::INTEGER))
            .build();
        let decl = TypeDecl::map_of(TypeDecl::STRING, TypeDecl::schema(&server));
        let collection = crate::handler::root_collection();
        let data = Value::from(json!({"web": {"port": 80}, "db": {"port": 5432}}));
        let loaded = collection.load(&decl, &data, None).unwrap();
        assert_eq!(
            loaded.get("db").and_then(|s| s.get("name")),
            Some(&Value::from("db"))
        );

        let dumped = collection.dump(&decl, &loaded, None).unwrap();
        assert_eq!(dumped, data);
    }

    #[test]
    fn test_default_factory_errors_carry_path() {
        let schema = Schema::builder("Flaky")
            .field(
                "x",
                Field::new(TypeDecl::STRING)
                    .with_factory(|| Err(Error::NoDefault("string".into()))),
            )
            .build();
        let err = load(&schema, json!({})).unwrap_err();
        assert_eq!(err.to_string(), "<root>: string has no default value");
    }
}
