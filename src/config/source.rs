use std::path::Path;
use std::sync::Arc;

use crate::value::{Mapping, Value};

use super::ConfigError;

/// A value to merge into the configuration at `path`.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub path: Vec<String>,
    pub value: Value,
}

impl ConfigEntry {
    pub fn root(value: Value) -> Self {
        Self {
            path: Vec::new(),
            value,
        }
    }

    pub fn at_path(path: Vec<String>, value: Value) -> Self {
        Self { path, value }
    }
}

pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError>;

    /// The file backing this source, if any.
    fn origin(&self) -> Option<&Path> {
        None
    }
}

/// A source that contributes an in-memory value at the root.
#[derive(Debug, Clone)]
pub struct ValueSource {
    value: Value,
}

impl ValueSource {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl ConfigSource for ValueSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        Ok(vec![ConfigEntry::root(self.value.clone())])
    }
}

pub fn merge_at_path(table: &mut Mapping, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Mapping(overlay) = value {
            deep_merge(table, unshare(overlay));
        }
        return;
    };

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Mapping(base)), Value::Mapping(overlay)) => {
                deep_merge(Arc::make_mut(base), unshare(overlay));
            }
            (_, value) => {
                table.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Mapping(_))) {
        table.insert(first.clone(), Value::from(Mapping::new()));
    }

    if let Some(Value::Mapping(nested)) = table.get_mut(first) {
        merge_at_path(Arc::make_mut(nested), rest, value);
    }
}

/// Merges `overlay` into `base`. Nested mappings merge recursively; any
/// other value replaces what was there.
pub fn deep_merge(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(base_table)), Value::Mapping(overlay_table)) => {
                deep_merge(Arc::make_mut(base_table), unshare(overlay_table));
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn unshare(map: Arc<Mapping>) -> Mapping {
    Arc::try_unwrap(map).unwrap_or_else(|shared| shared.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mapping(value: serde_json::Value) -> Mapping {
        Value::from(value).as_mapping().unwrap().clone()
    }

    #[test]
    fn test_deep_merge_nested() {
        let mut base = mapping(json!({"db": {"host": "a", "port": 1}, "list": [1]}));
        deep_merge(&mut base, mapping(json!({"db": {"port": 2}, "list": [2, 3]})));
        assert_eq!(
            Value::from(base),
            Value::from(json!({"db": {"host": "a", "port": 2}, "list": [2, 3]}))
        );
    }

    #[test]
    fn test_merge_at_path_creates_tables() {
        let mut base = Mapping::new();
        merge_at_path(
            &mut base,
            &["database".to_string(), "port".to_string()],
            Value::from(5432),
        );
        assert_eq!(Value::from(base), Value::from(json!({"database": {"port": 5432}})));
    }
}
