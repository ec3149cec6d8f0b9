//! Option scopes
//!
//! An option scope is the resolved key-value mapping visible to a task's hooks
//! and to placeholder interpolation at one node of the task tree.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Resolved options of one task invocation
///
/// Each invocation owns its scope. Cloning is deep, so a child scope never
/// aliases its parent or its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, Value>,
}

impl Options {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an option value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a mutable reference to an option value
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Get an option as a string slice, if it is a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Get an option as a boolean, if it is one
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Get an option as an integer, if it is one
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    /// Set an option, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style [`Options::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove an option
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Check if an option is set (even to null)
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Convert a YAML mapping into a scope, stringifying non-string keys
    pub fn from_mapping(mapping: &Mapping) -> Self {
        mapping
            .iter()
            .map(|(k, v)| (stringify(k), v.clone()))
            .collect()
    }

    /// Convert the scope back into a YAML mapping
    pub fn to_mapping(&self) -> Mapping {
        self.values
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Options {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Options {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Truthiness used by `on` conditions and placeholder negation
///
/// `false`, null, a missing value and the empty sequence are falsy.
/// Every other value, including `0` and `""`, is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Sequence(seq)) => !seq.is_empty(),
        Some(Value::Tagged(tagged)) => is_truthy(Some(&tagged.value)),
        Some(_) => true,
    }
}

/// Render a value as text
///
/// Strings are returned as-is, sequences are comma-joined, mappings use
/// YAML flow style and null renders as `null`.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(seq) => seq.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Mapping(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", stringify(k), stringify_nested(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => stringify(&tagged.value),
    }
}

fn stringify_nested(value: &Value) -> String {
    match value {
        Value::Sequence(seq) => format!(
            "[{}]",
            seq.iter().map(stringify_nested).collect::<Vec<_>>().join(", ")
        ),
        other => stringify(other),
    }
}
