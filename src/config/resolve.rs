//! `${path.to.field}` references between configuration values.
//!
//! A reference names a dotted path from the root of the merged value.
//! Mapping segments are matched by key and sequence segments by index, so
//! `${servers.0.host}` reaches into a list. `$$` produces a literal `$`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::ConfigError;
use crate::value::{Mapping, Value};

/// Replaces every reference in `root` by the scalar it points to.
///
/// Each string is expanded exactly once. A referenced string is expanded
/// before it is substituted, and its expansion is inserted verbatim, so
/// escaped text is never parsed a second time.
pub fn resolve_references(root: &mut Mapping) -> Result<(), ConfigError> {
    let snapshot = Value::from(root.clone());
    let mut resolver = Resolver::new(&snapshot);
    for value in root.values_mut() {
        resolver.resolve_value(value)?;
    }
    Ok(())
}

struct Resolver<'a> {
    root: &'a Value,
    expanded: HashMap<String, String>,
    visiting: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            expanded: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    fn resolve_value(&mut self, value: &mut Value) -> Result<(), ConfigError> {
        match value {
            Value::String(s) if s.contains('$') => {
                *s = self.expand(s)?;
            }
            Value::Mapping(entries) => {
                for item in Arc::make_mut(entries).values_mut() {
                    self.resolve_value(item)?;
                }
            }
            Value::Sequence(items) => {
                for item in Arc::make_mut(items).iter_mut() {
                    self.resolve_value(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn expand(&mut self, text: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let end = body.find('}').ok_or(ConfigError::UnclosedReference)?;
                out.push_str(&self.reference(&body[..end])?);
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    fn reference(&mut self, path: &str) -> Result<String, ConfigError> {
        if let Some(done) = self.expanded.get(path) {
            return Ok(done.clone());
        }
        if self.visiting.iter().any(|p| p == path) {
            return Err(ConfigError::CircularReference);
        }

        let root = self.root;
        let target = lookup(root, path)?;
        trace!(path, "resolving reference");
        self.visiting.push(path.to_owned());
        let rendered = match target {
            Value::String(s) => self.expand(s),
            other => render(other, path),
        };
        self.visiting.pop();

        let rendered = rendered?;
        self.expanded.insert(path.to_owned(), rendered.clone());
        Ok(rendered)
    }
}

fn lookup<'v>(root: &'v Value, path: &str) -> Result<&'v Value, ConfigError> {
    if path.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidReferencePath(path.to_owned()));
    }
    path.split('.')
        .try_fold(root, |current, part| match current {
            Value::Sequence(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(part),
        })
        .ok_or_else(|| ConfigError::ReferenceNotFound(path.to_owned()))
}

fn render(value: &Value, path: &str) -> Result<String, ConfigError> {
    match value {
        Value::Null => Ok("null".to_owned()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Instance(_) => {
            Err(ConfigError::NonScalarReference(path.to_owned()))
        }
    }
}
