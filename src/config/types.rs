//! Core configuration types
//!
//! This module defines the engine settings and the data structures of a YAML
//! task document.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::env;

/// Environment variable overriding [`Settings::verbosity`]
pub const VERBOSITY_ENV: &str = "AUTOMATON_VERBOSITY";

/// Environment variable overriding [`Settings::debug`]
pub const DEBUG_ENV: &str = "AUTOMATON_DEBUG";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Deepest task level that produces output (`-1` unlimited, `0` silent)
    pub verbosity: i32,

    /// Show debug messages
    pub debug: bool,

    /// Indent unit repeated once per nesting level
    pub indent: String,

    /// Color output written to terminals
    pub color: bool,

    /// Mirror log output to stderr while running
    pub echo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbosity: -1,
            debug: false,
            indent: "  ".to_string(),
            color: true,
            echo: false,
        }
    }
}

impl Settings {
    pub fn with_verbosity(mut self, verbosity: i32) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Apply `AUTOMATON_VERBOSITY`, `AUTOMATON_DEBUG` and `NO_COLOR`
    pub fn apply_env(mut self) -> ConfigResult<Self> {
        if let Ok(value) = env::var(VERBOSITY_ENV) {
            self.verbosity = value.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be an integer, got '{}'",
                    VERBOSITY_ENV, value
                ))
            })?;
        }

        if let Ok(value) = env::var(DEBUG_ENV) {
            self.debug = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if env::var_os("NO_COLOR").is_some() {
            self.color = false;
        }

        Ok(self)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.verbosity < -1 {
            return Err(ConfigError::Invalid(format!(
                "verbosity must be -1 or greater, got {}",
                self.verbosity
            )));
        }
        Ok(())
    }
}

/// A task definition as written in a YAML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Recognized options; an entry may be left empty
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Option<OptionDocument>>,

    #[serde(default)]
    pub tasks: Vec<SubtaskDocument>,
}

/// An option declaration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// An entry of a task document's `tasks` list
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubtaskDocument {
    pub task: TaskRefDocument,

    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub options: Mapping,

    /// Condition; an explicit `null` is kept and skips the subtask
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub on: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub mute: bool,

    #[serde(default = "default_fatal")]
    pub fatal: bool,
}

/// Reference to the task run by a subtask entry
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TaskRefDocument {
    /// Id of a registered task
    Id(String),

    /// Nested task definition
    Inline(Box<TaskDocument>),
}

fn default_fatal() -> bool {
    true
}

/// Deserialize a field that may be explicitly null as `Some(Value::Null)`
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_settings() {
        let yaml = r#"
verbosity: 2
debug: true
indent: "    "
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.verbosity, 2);
        assert!(settings.debug);
        assert_eq!(settings.indent, "    ");
        assert!(settings.color);
        assert!(!settings.echo);
    }

    #[test]
    fn test_settings_validate() {
        assert!(Settings::default().validate().is_ok());
        assert!(Settings::default().with_verbosity(-2).validate().is_err());
    }

    #[test]
    fn test_deserialize_task_document() {
        let yaml = r#"
id: deploy
description: Deploy {{env}}
options:
  env:
    description: Target environment
    default: staging
  dry-run:
tasks:
  - task: build
    options:
      release: "{{!dry-run}}"
  - task:
      description: Inline step
      tasks: []
    on: "{{env}}"
    fatal: false
"#;
        let doc: TaskDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.id.as_deref(), Some("deploy"));
        assert_eq!(doc.options.len(), 2);
        assert!(doc.options["dry-run"].is_none());
        assert_eq!(doc.tasks.len(), 2);
        assert!(matches!(doc.tasks[0].task, TaskRefDocument::Id(ref id) if id == "build"));
        assert!(doc.tasks[0].fatal);
        assert!(matches!(doc.tasks[1].task, TaskRefDocument::Inline(_)));
        assert!(!doc.tasks[1].fatal);
    }

    #[test]
    fn test_explicit_null_condition_is_kept() {
        let doc: SubtaskDocument = serde_yaml::from_str("task: x\non: null").unwrap();
        assert_eq!(doc.on, Some(Value::Null));

        let doc: SubtaskDocument = serde_yaml::from_str("task: x").unwrap();
        assert_eq!(doc.on, None);
    }
}
