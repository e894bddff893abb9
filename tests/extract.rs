use std::sync::Arc;

use dragon_extract::handler::BasicMatcher;
use dragon_extract::{
    dump, extract, register_type_handler, resolve_type_decl, Context, Error, Field, Key, Mapping,
    Schema, TypeDecl, TypeHandler, TypeMatcher, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Schemas {
    config: Arc<Schema>,
}

fn schemas() -> Schemas {
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
    let config = Schema::builder("Config")
        .field(
            "args",
            Field::new(TypeDecl::list_of(TypeDecl::STRING))
                .with_factory(|| Ok(Value::sequence([Value::from("foo"), Value::from("bar")]))),
        )
        .field("stuff", Field::new(TypeDecl::MAPPING).with_default(Value::Null))
        .field("items", Field::new(TypeDecl::list_of(TypeDecl::schema(&item))))
        .build();
    Schemas { config }
}

#[test]
fn test_extract_and_dump() {
    let Schemas { config } = schemas();
    let decl = TypeDecl::schema(&config);
    let data = json!({
        "items": [
            {"name": "A"},
            {"name": "B", "data": {"uri": "https://uri-here"}}
        ],
        "stuff": {"arbitrary": {"nested": [1, 2.5, true]}}
    });

    let loaded = extract(&decl, Value::from(data.clone())).unwrap();
    assert_eq!(
        loaded.get("args"),
        Some(&Value::sequence([Value::from("foo"), Value::from("bar")]))
    );
    let items = loaded.get("items").unwrap().as_sequence().unwrap();
    assert_eq!(items[0].get("name"), Some(&Value::from("A")));
    assert_eq!(items[0].get("data"), Some(&Value::Null));
    assert_eq!(items[1].get("name"), Some(&Value::from("B")));
    assert_eq!(
        items[1].get("data").and_then(|d| d.get("uri")),
        Some(&Value::from("https://uri-here"))
    );

    let dumped = dump(&decl, &loaded).unwrap();
    // "args" is filled from a default, so only the supplied keys round-trip.
    assert_eq!(dumped.get("items"), Value::from(data.clone()).get("items"));
    assert_eq!(dumped.get("stuff"), Value::from(data).get("stuff"));
}

#[test]
fn test_error_path_points_into_list() {
    let Schemas { config } = schemas();
    let data = json!({"items": [{"name": "A"}, {"name": "B", "data": {"uri": 1}}]});
    let err = extract(&TypeDecl::schema(&config), Value::from(data)).unwrap_err();
    assert_eq!(err.path(), Some("items.1.data.uri"));
    assert_eq!(
        err.to_string(),
        "items.1.data.uri: expected string, got integer"
    );
}

#[test]
fn test_override_in_subschema() {
    let a = Schema::builder("A")
        .field("value", Field::new(TypeDecl::STRING))
        .build();
    let b = Schema::builder("B")
        .extends(&a)
        .field("value", Field::new(TypeDecl::schema(&a)))
        .build();
    assert_eq!(b.fields().len(), 1);

    let x = extract(
        &TypeDecl::schema(&b),
        Value::from(json!({"value": {"value": "foo"}})),
    )
    .unwrap();
    let instance = x.as_instance().unwrap();
    assert!(Arc::ptr_eq(instance.schema(), &b));
    let inner = instance.get("value").unwrap().as_instance().unwrap();
    assert!(Arc::ptr_eq(inner.schema(), &a));
    assert_eq!(inner.get("value"), Some(&Value::from("foo")));
}

#[test]
fn test_subschema_instance_accepted_for_base() {
    let base = Schema::builder("Base")
        .field("name", Field::new(TypeDecl::STRING))
        .build();
    let derived = Schema::builder("Derived")
        .extends(&base)
        .field("extra", Field::new(TypeDecl::INTEGER).with_default(0))
        .build();
    let instance = Value::from(
        derived
            .construct(vec![Value::from("n")], Mapping::new())
            .unwrap(),
    );
    let loaded = extract(&TypeDecl::schema(&base), instance.clone()).unwrap();
    assert_eq!(loaded, instance);

    // Dumping through the base schema only emits the base's fields.
    let dumped = dump(&TypeDecl::schema(&base), &loaded).unwrap();
    assert_eq!(dumped, Value::from(json!({"name": "n"})));
}

#[test]
fn test_services_with_inherited_names_and_wildcards() {
    let service = Schema::builder("Service")
        .field("name", Field::inherit_key())
        .field("image", Field::new(TypeDecl::STRING))
        .field(
            "ports",
            Field::new(TypeDecl::list_of(TypeDecl::INTEGER)).with_type_default(),
        )
        .field("labels", Field::wildcard(TypeDecl::STRING, TypeDecl::STRING))
        .build();
    let compose = Schema::builder("Compose")
        .field("version", Field::new(TypeDecl::STRING).named("compose-version"))
        .field(
            "services",
            Field::new(TypeDecl::map_of(TypeDecl::STRING, TypeDecl::schema(&service))),
        )
        .build();
    let data = Value::from(json!({
        "compose-version": "3",
        "services": {
            "web": {"image": "nginx", "ports": [80, 443], "tier": "front"},
            "db": {"image": "postgres"}
        }
    }));

    let loaded = extract(&TypeDecl::schema(&compose), data.clone()).unwrap();
    assert_eq!(loaded.get("version"), Some(&Value::from("3")));
    let web = loaded.get("services").and_then(|s| s.get("web")).unwrap();
    assert_eq!(web.get("name"), Some(&Value::from("web")));
    assert_eq!(web.get("labels"), Some(&Value::from(json!({"tier": "front"}))));
    let db = loaded.get("services").and_then(|s| s.get("db")).unwrap();
    assert_eq!(db.get("ports"), Some(&Value::from(Vec::new())));
    assert_eq!(
        db.as_instance().unwrap().load_context().unwrap().path,
        vec![Key::from("services"), Key::from("db")]
    );

    let dumped = dump(&TypeDecl::schema(&compose), &loaded).unwrap();
    assert_eq!(
        dumped,
        Value::from(json!({
            "compose-version": "3",
            "services": {
                "web": {"image": "nginx", "ports": [80, 443], "tier": "front"},
                "db": {"image": "postgres", "ports": []}
            }
        }))
    );
}

#[test]
fn test_missing_required_field() {
    let schema = Schema::builder("Required")
        .field("value", Field::new(TypeDecl::STRING))
        .build();
    let err = extract(&TypeDecl::schema(&schema), Value::from(json!({}))).unwrap_err();
    assert!(matches!(&err, Error::Value { path, .. } if path == "<root>"));
    assert_eq!(err.to_string(), "<root>: missing required field value");
}

#[derive(Debug)]
struct Port;

impl TypeHandler for Port {
    fn load(&self, data: &Value, context: &Context) -> Result<Value, Error> {
        match data.as_integer() {
            Some(port @ 1..=65535) => Ok(Value::from(port)),
            Some(port) => Err(context.value_error(format_args!("port {port} out of range"))),
            None => Err(context.type_error(data.type_name(), "port")),
        }
    }

    fn dump(&self, obj: &Value, _context: &Context) -> Result<Value, Error> {
        Ok(obj.clone())
    }
}

struct PortMatcher;

impl TypeMatcher for PortMatcher {
    fn matches(&self, decl: &TypeDecl) -> Option<Arc<dyn TypeHandler>> {
        match decl {
            TypeDecl::Named(name) if name == "port" => Some(Arc::new(Port)),
            _ => None,
        }
    }
}

#[test]
fn test_process_wide_registration() {
    register_type_handler(PortMatcher).unwrap();
    assert!(matches!(
        register_type_handler(PortMatcher),
        Err(Error::DuplicateHandler(_))
    ));
    assert!(matches!(
        register_type_handler(BasicMatcher),
        Err(Error::DuplicateHandler(_))
    ));
    assert!(resolve_type_decl(&TypeDecl::named("port")).is_ok());

    let listen = Schema::builder("Listen")
        .field("port", Field::new(TypeDecl::named("port")))
        .build();
    let err = extract(
        &TypeDecl::schema(&listen),
        Value::from(json!({"port": 70000})),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "port: port 70000 out of range");
}
