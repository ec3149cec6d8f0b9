//! `on` condition evaluation
//!
//! This module decides whether a subtask runs, given its parent's options.

use crate::runner::task::catch_panic;
use crate::runner::{interpolate, is_truthy, single_placeholder, Condition, Options};
use serde_yaml::Value;

/// Evaluate a subtask condition against the parent's resolved options
///
/// A string is interpolated first; a template that is a single placeholder
/// naming a missing option counts as undefined, hence falsy. Other values
/// are used literally. A panicking callable is reported as an error.
pub fn evaluate_condition(condition: &Condition, options: &Options) -> anyhow::Result<bool> {
    match condition {
        Condition::Callable(f) => catch_panic(|| f(options)),
        Condition::Value(Value::String(template)) => Ok(evaluate_template(template, options)),
        Condition::Value(value) => Ok(is_truthy(Some(value))),
    }
}

fn evaluate_template(template: &str, options: &Options) -> bool {
    if let Some((bangs, name)) = single_placeholder(template) {
        if !options.contains(name) {
            return bangs % 2 == 1;
        }
    }

    is_truthy(Some(&interpolate(template, options)))
}
