use crate::value::Value;

use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;

/// Contributes `PREFIX<sep>A<sep>B=value` variables at the path `a.b`.
///
/// Values are read as YAML scalars, so `8080` becomes an integer, `true`
/// a boolean, `~` null and `[a, b]` a sequence. Anything YAML would read as
/// text (or as a mapping) is kept as the raw variable value.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    /// An empty `separator` maps every variable to a single top-level key.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
        }
    }

    fn entries_from<I>(&self, vars: I) -> Vec<ConfigEntry>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let head = format!("{}{}", self.prefix, self.separator);
        vars.into_iter()
            .filter_map(|(key, raw)| {
                let rest = key.strip_prefix(&head).filter(|rest| !rest.is_empty())?;
                Some(ConfigEntry::at_path(self.path_of(rest), scalar(raw)))
            })
            .collect()
    }

    fn path_of(&self, rest: &str) -> Vec<String> {
        if self.separator.is_empty() {
            return vec![rest.to_lowercase()];
        }
        rest.split(self.separator.as_str())
            .map(str::to_lowercase)
            .collect()
    }
}

impl ConfigSource for EnvSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        Ok(self.entries_from(std::env::vars()))
    }
}

fn scalar(raw: String) -> Value {
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(Value::String(_) | Value::Mapping(_)) | Err(_) => Value::String(raw),
        Ok(_) if raw.trim().is_empty() => Value::String(raw),
        Ok(value) => value,
    }
}
