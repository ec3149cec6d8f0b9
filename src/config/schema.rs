//! Task validation
//!
//! Two entry points share one set of rules: [`validate_task`] checks a task
//! built in code, [`validate_document`] checks a raw YAML task document before
//! it is deserialized. Both stop at the first problem and report the id of
//! the task containing it along with the field path.

use crate::error::{ValidationError, ValidationResult};
use crate::runner::{TaskDef, TaskRef};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

static OPTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w-]+$").expect("valid option name regex"));

const TASK_KEYS: &[&str] = &["id", "name", "author", "description", "options", "tasks"];
const HOOK_KEYS: &[&str] = &["setup", "teardown", "filter"];
const OPTION_KEYS: &[&str] = &["description", "default"];
const SUBTASK_KEYS: &[&str] = &["task", "options", "on", "description", "mute", "fatal"];

/// Validate a task definition and every inline task nested in it
pub fn validate_task(task: &TaskDef) -> ValidationResult<()> {
    check_task(task, task.id.as_deref(), "")
}

fn check_task(task: &TaskDef, owner: Option<&str>, prefix: &str) -> ValidationResult<()> {
    // Fields of a task with its own id are reported against that id
    let (owner, prefix) = match task.id.as_deref() {
        Some(id) if !id.trim().is_empty() => (Some(id), String::new()),
        Some(_) => {
            return Err(ValidationError::new(
                owner,
                format!("{}id", prefix),
                "must be a non-empty string",
            ))
        }
        None => (owner, prefix.to_string()),
    };

    for name in task.options.keys() {
        check_option_name(name, owner, &format!("{}options.{}", prefix, name))?;
    }

    for (i, subtask) in task.tasks.iter().enumerate() {
        let field = format!("{}tasks[{}]", prefix, i);

        for key in subtask.options.keys() {
            if !key.is_string() {
                return Err(ValidationError::new(
                    owner,
                    format!("{}.options", field),
                    "option names must be strings",
                ));
            }
        }

        match &subtask.task {
            TaskRef::Id(id) if id.trim().is_empty() => {
                return Err(ValidationError::new(
                    owner,
                    format!("{}.task", field),
                    "task id must not be empty",
                ))
            }
            TaskRef::Id(_) | TaskRef::Action(_) => {}
            TaskRef::Inline(inline) => {
                check_task(inline, owner, &format!("{}.task.", field))?;
            }
        }
    }

    Ok(())
}

fn check_option_name(name: &str, owner: Option<&str>, field: &str) -> ValidationResult<()> {
    if OPTION_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new(
            owner,
            field,
            "option names may only contain letters, digits, '_' and '-'",
        ))
    }
}

/// Validate a raw task document
pub fn validate_document(doc: &Value) -> ValidationResult<()> {
    check_document(doc, None, "")
}

fn check_document(doc: &Value, owner: Option<&str>, prefix: &str) -> ValidationResult<()> {
    let map = doc.as_mapping().ok_or_else(|| {
        ValidationError::new(owner, field_or_root(prefix), "task must be a mapping")
    })?;

    let (owner, prefix) = match map.get("id") {
        None => (owner, prefix.to_string()),
        Some(Value::String(id)) if !id.trim().is_empty() => (Some(id.as_str()), String::new()),
        Some(_) => {
            return Err(ValidationError::new(
                owner,
                format!("{}id", prefix),
                "must be a non-empty string",
            ))
        }
    };

    check_keys(map, TASK_KEYS, owner, &prefix)?;

    for key in ["name", "author", "description"] {
        if let Some(value) = map.get(key) {
            if !value.is_string() {
                return Err(ValidationError::new(
                    owner,
                    format!("{}{}", prefix, key),
                    "must be a string",
                ));
            }
        }
    }

    if let Some(options) = map.get("options") {
        check_option_documents(options, owner, &prefix)?;
    }

    match map.get("tasks") {
        None => Ok(()),
        Some(Value::Sequence(tasks)) => {
            for (i, entry) in tasks.iter().enumerate() {
                check_subtask_document(entry, owner, &format!("{}tasks[{}]", prefix, i))?;
            }
            Ok(())
        }
        Some(_) => Err(ValidationError::new(
            owner,
            format!("{}tasks", prefix),
            "must be an array (use [] for none)",
        )),
    }
}

fn check_keys(
    map: &Mapping,
    allowed: &[&str],
    owner: Option<&str>,
    prefix: &str,
) -> ValidationResult<()> {
    for key in map.keys() {
        let name = key.as_str().unwrap_or_default();
        if allowed.contains(&name) {
            continue;
        }
        let message = if HOOK_KEYS.contains(&name) {
            "hooks cannot be declared in a task document; register the task from code"
                .to_string()
        } else {
            format!("unknown field (expected one of: {})", allowed.join(", "))
        };
        let display = key.as_str().map_or_else(|| format!("{:?}", key), str::to_string);
        return Err(ValidationError::new(
            owner,
            format!("{}{}", prefix, display),
            message,
        ));
    }
    Ok(())
}

fn check_option_documents(options: &Value, owner: Option<&str>, prefix: &str) -> ValidationResult<()> {
    let options = options.as_mapping().ok_or_else(|| {
        ValidationError::new(owner, format!("{}options", prefix), "must be a mapping")
    })?;

    for (key, option) in options {
        let name = key.as_str().ok_or_else(|| {
            ValidationError::new(
                owner,
                format!("{}options", prefix),
                "option names must be strings",
            )
        })?;
        let field = format!("{}options.{}", prefix, name);
        check_option_name(name, owner, &field)?;

        match option {
            Value::Null => {}
            Value::Mapping(def) => {
                check_keys(def, OPTION_KEYS, owner, &format!("{}.", field))?;
                if let Some(description) = def.get("description") {
                    if !description.is_string() {
                        return Err(ValidationError::new(
                            owner,
                            format!("{}.description", field),
                            "must be a string",
                        ));
                    }
                }
            }
            _ => {
                return Err(ValidationError::new(
                    owner,
                    field,
                    "must be a mapping with 'description' and/or 'default'",
                ))
            }
        }
    }

    Ok(())
}

fn check_subtask_document(entry: &Value, owner: Option<&str>, field: &str) -> ValidationResult<()> {
    let map = entry
        .as_mapping()
        .ok_or_else(|| ValidationError::new(owner, field, "subtask must be a mapping"))?;

    check_keys(map, SUBTASK_KEYS, owner, &format!("{}.", field))?;

    match map.get("task") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(Value::String(_)) => {
            return Err(ValidationError::new(
                owner,
                format!("{}.task", field),
                "task id must not be empty",
            ))
        }
        Some(inline @ Value::Mapping(_)) => {
            check_document(inline, owner, &format!("{}.task.", field))?;
        }
        Some(_) => {
            return Err(ValidationError::new(
                owner,
                format!("{}.task", field),
                "must be a task id or an inline task definition",
            ))
        }
        None => {
            return Err(ValidationError::new(
                owner,
                format!("{}.task", field),
                "is required",
            ))
        }
    }

    if let Some(options) = map.get("options") {
        let options = options.as_mapping().ok_or_else(|| {
            ValidationError::new(owner, format!("{}.options", field), "must be a mapping")
        })?;
        if options.keys().any(|k| !k.is_string()) {
            return Err(ValidationError::new(
                owner,
                format!("{}.options", field),
                "option names must be strings",
            ));
        }
    }

    match map.get("description") {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ValidationError::new(
                owner,
                format!("{}.description", field),
                "must be a string or null",
            ))
        }
    }

    for flag in ["mute", "fatal"] {
        if let Some(value) = map.get(flag) {
            if !value.is_bool() {
                return Err(ValidationError::new(
                    owner,
                    format!("{}.{}", field, flag),
                    "must be a boolean",
                ));
            }
        }
    }

    Ok(())
}

fn field_or_root(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('.');
    if trimmed.is_empty() {
        "<root>".to_string()
    } else {
        trimmed.to_string()
    }
}
