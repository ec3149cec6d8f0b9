//! Placeholder interpolation
//!
//! This module replaces `{{name}}` placeholders in strings with values from an
//! option scope.
//!
//! Supports:
//! - `{{name}}` - value of `name`; a template made of a single known placeholder
//!   yields the value itself, keeping its type
//! - `{{!name}}` - boolean negation, repeatable (`{{!!name}}`)
//! - `\{\{name\}\}` - escaped placeholder, emitted as a literal `{{name}}`

use crate::runner::options::{is_truthy, stringify, Options};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\\{\\\{([\w-]+)\\\}\\\}|\{\{(!*)([\w-]+)\}\}").expect("valid placeholder regex")
});

static SINGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{(!*)([\w-]+)\}\}$").expect("valid placeholder regex"));

/// Interpolation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpolateOptions {
    /// Remove placeholders that have no replacement instead of keeping them
    pub purge: bool,
}

/// Interpolate a template, casting single-placeholder templates
pub fn interpolate(template: &str, replacements: &Options) -> Value {
    interpolate_with(template, replacements, InterpolateOptions::default())
}

/// Interpolate a template with explicit switches
pub fn interpolate_with(template: &str, replacements: &Options, opts: InterpolateOptions) -> Value {
    if let Some((bangs, name)) = single_placeholder(template) {
        if let Some(value) = replacements.get(name) {
            return negate(value, bangs);
        }
    }

    Value::String(substitute(template, replacements, opts))
}

/// Split a template made of exactly one placeholder into its negation
/// count and option name
pub fn single_placeholder(template: &str) -> Option<(usize, &str)> {
    SINGLE_RE.captures(template).map(|caps| {
        let bangs = caps.get(1).map_or(0, |m| m.as_str().len());
        let name = caps.get(2).map_or("", |m| m.as_str());
        (bangs, name)
    })
}

/// Interpolate a template, always producing a string
pub fn interpolate_str(template: &str, replacements: &Options) -> String {
    substitute(template, replacements, InterpolateOptions::default())
}

/// Interpolate every string inside a value, recursing into sequences and
/// mappings (keys included)
pub fn interpolate_value(value: &Value, replacements: &Options) -> Value {
    match value {
        Value::String(s) => interpolate(s, replacements),
        Value::Sequence(seq) => Value::Sequence(
            seq.iter()
                .map(|item| interpolate_value(item, replacements))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(interpolate_mapping(map, replacements)),
        other => other.clone(),
    }
}

/// Interpolate the keys and values of a mapping
pub fn interpolate_mapping(map: &Mapping, replacements: &Options) -> Mapping {
    map.iter()
        .map(|(k, v)| (interpolate_key(k, replacements), interpolate_value(v, replacements)))
        .collect()
}

/// Interpolate a subtask's `options` into a fresh scope
pub fn interpolate_options(map: &Mapping, replacements: &Options) -> Options {
    map.iter()
        .map(|(k, v)| {
            (
                stringify(&interpolate_key(k, replacements)),
                interpolate_value(v, replacements),
            )
        })
        .collect()
}

/// Interpolate a list of templates
pub fn interpolate_list(list: &[String], replacements: &Options) -> Vec<Value> {
    list.iter().map(|s| interpolate(s, replacements)).collect()
}

fn interpolate_key(key: &Value, replacements: &Options) -> Value {
    match key {
        Value::String(s) => Value::String(interpolate_str(s, replacements)),
        other => other.clone(),
    }
}

fn substitute(template: &str, replacements: &Options, opts: InterpolateOptions) -> String {
    TOKEN_RE
        .replace_all(template, |caps: &Captures| {
            if let Some(escaped) = caps.get(1) {
                return format!("{{{{{}}}}}", escaped.as_str());
            }

            let bangs = caps.get(2).map_or(0, |m| m.as_str().len());
            let name = &caps[3];
            match replacements.get(name) {
                Some(value) => stringify(&negate(value, bangs)),
                None if opts.purge => String::new(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn negate(value: &Value, bangs: usize) -> Value {
    if bangs == 0 {
        return value.clone();
    }

    let truthy = is_truthy(Some(value));
    Value::Bool(if bangs % 2 == 1 { !truthy } else { truthy })
}
