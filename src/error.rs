//! Error types for Automaton

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Automaton operations
pub type Result<T> = std::result::Result<T, AutomatonError>;

/// Main error type for Automaton
#[derive(Error, Debug)]
pub enum AutomatonError {
    /// Malformed task definition
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reference to a task that cannot be resolved
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A setup, action or teardown hook failed
    #[error("Task failed: {0}")]
    Hook(#[from] HookError),

    /// Settings or task file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run was cancelled through its token
    #[error("Run cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A task definition that does not satisfy the task schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task '{task}': {field}: {message}")]
pub struct ValidationError {
    /// Id of the task containing the invalid field
    pub task: String,

    /// Path of the invalid field, e.g. `tasks[1].task`
    pub field: String,

    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    pub fn new(task: Option<&str>, field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            task: task.unwrap_or(ANONYMOUS_TASK).to_string(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Label used in errors for tasks declared without an id
pub const ANONYMOUS_TASK: &str = "<anonymous>";

/// Task resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Task '{0}' is not registered")]
    UnknownTask(String),

    #[error("Circular task reference: {0}")]
    CircularReference(String),
}

/// The hook that produced a [`HookError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// A callable `on` condition
    Condition,
    /// A dynamic description
    Description,
    Setup,
    Action,
    Teardown,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Condition => write!(f, "condition"),
            HookStage::Description => write!(f, "description"),
            HookStage::Setup => write!(f, "setup"),
            HookStage::Action => write!(f, "action"),
            HookStage::Teardown => write!(f, "teardown"),
        }
    }
}

/// Failure reported (or panicked) by a user hook
#[derive(Error, Debug)]
#[error("{stage} of '{task}' failed: {cause}")]
pub struct HookError {
    pub task: String,
    pub stage: HookStage,
    pub cause: anyhow::Error,
}

/// Settings and task file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find settings file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for validation
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

impl AutomatonError {
    /// Whether a `fatal: false` subtask may swallow this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AutomatonError::Cancelled)
    }
}
