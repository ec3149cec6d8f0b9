//! Task registry
//!
//! Maps task ids to validated task definitions. Each engine owns its own
//! registry.

use crate::config::validate_task;
use crate::error::{LookupError, ValidationError, ValidationResult};
use crate::runner::TaskDef;
use std::collections::HashMap;
use std::sync::Arc;

/// Registered tasks, by id
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: HashMap<String, Arc<TaskDef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a task under its id, replacing any previous one
    pub fn register(&mut self, task: TaskDef) -> ValidationResult<()> {
        let id = match task.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => {
                return Err(ValidationError::new(
                    task.id.as_deref(),
                    "id",
                    "registered tasks need a non-empty id",
                ))
            }
        };

        validate_task(&task)?;

        if self.tasks.insert(id.clone(), Arc::new(task)).is_some() {
            tracing::debug!("Replaced task '{}'", id);
        } else {
            tracing::debug!("Registered task '{}'", id);
        }
        Ok(())
    }

    /// Remove a task, returning it if it was registered
    pub fn unregister(&mut self, id: &str) -> Option<Arc<TaskDef>> {
        self.tasks.remove(id)
    }

    /// Get a registered task
    pub fn lookup(&self, id: &str) -> Result<Arc<TaskDef>, LookupError> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::UnknownTask(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry
            .register(TaskDef::new().with_id("mkdir").with_name("Make dir"))
            .unwrap();

        assert!(registry.contains("mkdir"));
        let task = registry.lookup("mkdir").unwrap();
        assert_eq!(task.name.as_deref(), Some("Make dir"));
        assert_eq!(registry.ids(), vec!["mkdir".to_string()]);
    }

    #[test]
    fn test_register_requires_id() {
        let mut registry = Registry::new();

        let err = registry.register(TaskDef::new()).unwrap_err();
        assert_eq!(err.field, "id");

        let err = registry.register(TaskDef::new().with_id("  ")).unwrap_err();
        assert_eq!(err.field, "id");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = Registry::new();
        registry
            .register(TaskDef::new().with_id("copy").with_name("first"))
            .unwrap();
        registry
            .register(TaskDef::new().with_id("copy").with_name("second"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("copy").unwrap().name.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_unregister() {
        let mut registry = Registry::new();
        registry.register(TaskDef::new().with_id("rm")).unwrap();

        assert!(registry.unregister("rm").is_some());
        assert!(registry.unregister("rm").is_none());
        assert_eq!(
            registry.lookup("rm").unwrap_err(),
            LookupError::UnknownTask("rm".to_string())
        );
    }

    #[test]
    fn test_register_validates() {
        let mut registry = Registry::new();
        let task = TaskDef::new().with_id("bad").task("");
        let err = registry.register(task).unwrap_err();
        assert_eq!(err.task, "bad");
        assert_eq!(err.field, "tasks[0].task");
    }
}
