//! Task definitions
//!
//! This module contains the runtime representation of tasks: definitions,
//! the subtask invocations they declare, and the hooks they run.

use crate::config::{OptionDocument, SubtaskDocument, TaskDocument, TaskRefDocument};
use crate::error::ANONYMOUS_TASK;
use crate::runner::{interpolate_str, Context, Options};
use anyhow::anyhow;
use serde_yaml::{Mapping, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type HookFn = dyn Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync;

/// A setup, teardown or action callable
///
/// Hooks receive the task's option scope, which they may mutate, and the
/// execution context. Returning an error and panicking are both reported
/// as a failure of the hook.
#[derive(Clone)]
pub struct Hook(Arc<HookFn>);

impl Hook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Hook(Arc::new(f))
    }

    /// Invoke the hook, converting a panic into an error
    pub fn call(&self, options: &mut Options, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        catch_panic(|| (self.0)(options, ctx))?
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// Run user code, turning a panic into an error
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| anyhow!("panicked: {}", panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Text shown in a task's header line
#[derive(Clone)]
pub enum Description {
    /// Template interpolated against the task's options
    Text(String),

    /// Computed from the task's options at run time
    Dynamic(Arc<dyn Fn(&Options) -> String + Send + Sync>),
}

impl Description {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Options) -> String + Send + Sync + 'static,
    {
        Description::Dynamic(Arc::new(f))
    }

    /// Render against a task's options; a panicking callable is an error
    pub fn render(&self, options: &Options) -> anyhow::Result<String> {
        match self {
            Description::Text(template) => Ok(interpolate_str(template, options)),
            Description::Dynamic(f) => catch_panic(|| f(options)),
        }
    }
}

impl fmt::Debug for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Description::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Description {
    fn from(text: &str) -> Self {
        Description::Text(text.to_string())
    }
}

impl From<String> for Description {
    fn from(text: String) -> Self {
        Description::Text(text)
    }
}

/// Condition deciding whether a subtask runs
#[derive(Clone)]
pub enum Condition {
    /// Literal value, or a placeholder template when it is a string
    Value(Value),

    /// Evaluated against the parent's options
    Callable(Arc<dyn Fn(&Options) -> bool + Send + Sync>),
}

impl Condition {
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&Options) -> bool + Send + Sync + 'static,
    {
        Condition::Callable(Arc::new(f))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Condition::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        Condition::Value(value)
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Condition::Value(Value::Bool(value))
    }
}

impl From<&str> for Condition {
    fn from(template: &str) -> Self {
        Condition::Value(Value::String(template.to_string()))
    }
}

/// Declaration of an option a task understands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionDef {
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl OptionDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn from_document(doc: OptionDocument) -> Self {
        OptionDef {
            description: doc.description,
            default: doc.default,
        }
    }
}

/// Reference to the task a subtask invocation runs
#[derive(Debug, Clone)]
pub enum TaskRef {
    /// Id of a registered task
    Id(String),

    /// Task definition given in place
    Inline(Arc<TaskDef>),

    /// Leaf action
    Action(Hook),
}

impl TaskRef {
    pub fn action<F>(f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        TaskRef::Action(Hook::new(f))
    }

    /// Name used in diagnostics
    pub fn label(&self) -> &str {
        match self {
            TaskRef::Id(id) => id,
            TaskRef::Inline(def) => def.label(),
            TaskRef::Action(_) => "<action>",
        }
    }
}

impl From<&str> for TaskRef {
    fn from(id: &str) -> Self {
        TaskRef::Id(id.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(id: String) -> Self {
        TaskRef::Id(id)
    }
}

impl From<TaskDef> for TaskRef {
    fn from(def: TaskDef) -> Self {
        TaskRef::Inline(Arc::new(def))
    }
}

impl From<Arc<TaskDef>> for TaskRef {
    fn from(def: Arc<TaskDef>) -> Self {
        TaskRef::Inline(def)
    }
}

impl From<Hook> for TaskRef {
    fn from(hook: Hook) -> Self {
        TaskRef::Action(hook)
    }
}

/// One entry of a task's `tasks` list
#[derive(Debug, Clone)]
pub struct Subtask {
    pub task: TaskRef,

    /// Options passed to the task; string values are templates resolved
    /// against the parent's options
    pub options: Mapping,

    /// Skip the whole subtree when this resolves falsy
    pub on: Option<Condition>,

    pub description: Option<Description>,

    /// Suppress all log output of the subtree
    pub mute: bool,

    /// Whether a failure aborts the parent (default) or is only logged
    pub fatal: bool,
}

impl Subtask {
    pub fn new(task: impl Into<TaskRef>) -> Self {
        Subtask {
            task: task.into(),
            options: Mapping::new(),
            on: None,
            description: None,
            mute: false,
            fatal: true,
        }
    }

    /// Pass one option to the task
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(Value::String(key.into()), value.into());
        self
    }

    pub fn with_options(mut self, options: Mapping) -> Self {
        self.options = options;
        self
    }

    pub fn on(mut self, condition: impl Into<Condition>) -> Self {
        self.on = Some(condition.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<Description>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn from_document(doc: SubtaskDocument) -> Self {
        let task = match doc.task {
            TaskRefDocument::Id(id) => TaskRef::Id(id),
            TaskRefDocument::Inline(inline) => TaskRef::from(TaskDef::from_document(*inline)),
        };

        Subtask {
            task,
            options: doc.options,
            on: doc.on.map(Condition::Value),
            description: doc.description.map(Description::Text),
            mute: doc.mute,
            fatal: doc.fatal,
        }
    }
}

/// A reusable unit of work
#[derive(Debug, Clone, Default)]
pub struct TaskDef {
    /// Required only when the task is registered
    pub id: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub description: Option<Description>,
    pub options: BTreeMap<String, OptionDef>,
    pub setup: Option<Hook>,
    pub teardown: Option<Hook>,
    pub tasks: Vec<Subtask>,
}

impl TaskDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<Description>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, option: OptionDef) -> Self {
        self.options.insert(name.into(), option);
        self
    }

    /// Hook run before the subtasks, able to change the option scope they see
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.setup = Some(Hook::new(f));
        self
    }

    /// Older name of [`TaskDef::setup`]
    #[deprecated(note = "use `setup`")]
    pub fn filter<F>(self, f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.setup(f)
    }

    /// Hook run after every subtask completed successfully
    pub fn teardown<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.teardown = Some(Hook::new(f));
        self
    }

    pub fn subtask(mut self, subtask: Subtask) -> Self {
        self.tasks.push(subtask);
        self
    }

    /// Add a subtask with no options or flags
    pub fn task(self, task: impl Into<TaskRef>) -> Self {
        self.subtask(Subtask::new(task))
    }

    /// Add a leaf action subtask
    pub fn action<F>(self, f: F) -> Self
    where
        F: Fn(&mut Options, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subtask(Subtask::new(TaskRef::action(f)))
    }

    /// Name used in diagnostics: the id, then the name
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(ANONYMOUS_TASK)
    }

    /// Fill in declared defaults for options missing from `options`
    pub fn apply_defaults(&self, options: &mut Options) {
        for (name, option) in &self.options {
            if options.contains(name) {
                continue;
            }
            if let Some(default) = &option.default {
                options.set(name.clone(), default.clone());
            }
        }
    }

    /// Create a task from a parsed task document
    pub fn from_document(doc: TaskDocument) -> Self {
        TaskDef {
            id: doc.id,
            name: doc.name,
            author: doc.author,
            description: doc.description.map(Description::Text),
            options: doc
                .options
                .into_iter()
                .map(|(k, v)| (k, OptionDef::from_document(v.unwrap_or_default())))
                .collect(),
            setup: None,
            teardown: None,
            tasks: doc.tasks.into_iter().map(Subtask::from_document).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CancelToken;
    use crate::ui::Logger;

    fn call(hook: &Hook, options: &mut Options) -> anyhow::Result<()> {
        let mut logger = Logger::new();
        let token = CancelToken::new();
        let mut ctx = Context::new(&mut logger, 1, "test", &token);
        hook.call(options, &mut ctx)
    }

    #[test]
    fn test_hook_mutates_options() {
        let hook = Hook::new(|opts, _ctx| {
            opts.set("touched", true);
            Ok(())
        });
        let mut options = Options::new();
        call(&hook, &mut options).unwrap();
        assert_eq!(options.get_bool("touched"), Some(true));
    }

    #[test]
    fn test_hook_panic_becomes_error() {
        let hook = Hook::new(|_opts, _ctx| panic!("exploded"));
        let err = call(&hook, &mut Options::new()).unwrap_err();
        assert_eq!(err.to_string(), "panicked: exploded");
    }

    #[test]
    fn test_description_render() {
        let opts = Options::new().with("src", "a.txt");
        assert_eq!(
            Description::from("Copy {{src}}").render(&opts).unwrap(),
            "Copy a.txt"
        );

        let dynamic = Description::dynamic(|o| format!("{} files", o.len()));
        assert_eq!(dynamic.render(&opts).unwrap(), "1 files");
    }

    #[test]
    fn test_dynamic_description_panic_becomes_error() {
        let dynamic = Description::dynamic(|_| panic!("no title"));
        let err = dynamic.render(&Options::new()).unwrap_err();
        assert_eq!(err.to_string(), "panicked: no title");
    }

    #[test]
    fn test_apply_defaults_keeps_supplied_values() {
        let def = TaskDef::new()
            .with_option("mode", OptionDef::new().with_default("0755"))
            .with_option("force", OptionDef::new().with_default(false))
            .with_option("dest", OptionDef::new().with_description("Target"));

        let mut options = Options::new().with("mode", "0644");
        def.apply_defaults(&mut options);

        assert_eq!(options.get_str("mode"), Some("0644"));
        assert_eq!(options.get_bool("force"), Some(false));
        assert!(!options.contains("dest"));
    }

    #[test]
    fn test_label_fallbacks() {
        assert_eq!(TaskDef::new().with_id("a").with_name("b").label(), "a");
        assert_eq!(TaskDef::new().with_name("b").label(), "b");
        assert_eq!(TaskDef::new().label(), ANONYMOUS_TASK);
        assert_eq!(TaskRef::from("copy").label(), "copy");
    }

    #[test]
    fn test_subtask_defaults() {
        let sub = Subtask::new("mkdir");
        assert!(sub.fatal);
        assert!(!sub.mute);
        assert!(sub.on.is_none());
        assert!(sub.options.is_empty());
    }

    #[test]
    #[allow(deprecated)]
    fn test_filter_sets_setup() {
        let def = TaskDef::new().filter(|_, _| Ok(()));
        assert!(def.setup.is_some());
    }
}
