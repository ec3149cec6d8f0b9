//! Task tree execution
//!
//! Tasks run depth-first in declared order, one at a time. For every subtask
//! invocation the engine:
//!
//! 1. evaluates `on` against the parent's options and skips the whole
//!    subtree when it is falsy,
//! 2. resolves the referenced task,
//! 3. builds a fresh option scope from the invocation's interpolated options
//!    and the task's declared defaults,
//! 4. prints the task header, runs `setup`, the subtasks (or the action) and
//!    finally `teardown`.
//!
//! A failure stops the remaining siblings and propagates upward, skipping
//! every pending teardown, unless the failing invocation is marked
//! `fatal: false`.

use crate::config::{load_task_directory, validate_task, Settings};
use crate::error::{AutomatonError, HookError, HookStage, LookupError, Result};
use crate::runner::{
    evaluate_condition, interpolate_options, CancelToken, Context, Description, Hook, Options,
    Registry, Subtask, TaskDef, TaskRef,
};
use crate::ui::{LogStream, Logger};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Header text of a task with neither description nor name
pub const UNNAMED_TASK: &str = "??";

/// Task engine: a registry of tasks plus the settings used to run them
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    registry: Registry,
    settings: Settings,
}

impl Automaton {
    /// Create an engine with default settings and no tasks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with specific settings
    pub fn with_settings(settings: Settings) -> Self {
        Automaton {
            registry: Registry::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a task for reuse by id
    pub fn add(&mut self, task: TaskDef) -> Result<()> {
        self.registry.register(task)?;
        Ok(())
    }

    /// Unregister a task
    pub fn remove(&mut self, id: &str) -> Option<Arc<TaskDef>> {
        self.registry.unregister(id)
    }

    /// Register every task file in a directory, returning the ids
    pub fn load_directory(&mut self, dir: &Path) -> Result<Vec<String>> {
        let tasks = load_task_directory(dir)?;
        let mut ids = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = task.label().to_string();
            self.registry.register(task)?;
            ids.push(id);
        }

        Ok(ids)
    }

    /// Run a task to completion
    ///
    /// The returned log stream holds every line the run produced, whether it
    /// succeeded or not.
    pub fn run(&self, task: impl Into<TaskRef>, options: Option<Options>) -> RunOutcome {
        let mut logger = Logger::from_settings(&self.settings);
        let log = logger.stream();
        let result = self.run_with_logger(task, options, &mut logger, &CancelToken::new());
        RunOutcome { result, log }
    }

    /// Run a task writing to a caller-provided logger
    pub fn run_with_logger(
        &self,
        task: impl Into<TaskRef>,
        options: Option<Options>,
        logger: &mut Logger,
        cancel: &CancelToken,
    ) -> Result<()> {
        let task = task.into();
        tracing::debug!("Running task: {}", task.label());

        let result = Execution {
            registry: &self.registry,
            logger: &mut *logger,
            cancel,
            chain: Vec::new(),
        }
        .run_root(&task, options.unwrap_or_default());

        if let Err(e) = &result {
            logger.break_line(1);
            logger.at(1).errorln(e.to_string());
        }
        result
    }

    /// Run a task on a worker thread
    ///
    /// The handle's log stream is live: events can be read while the run is
    /// still going.
    pub fn spawn(
        automaton: Arc<Automaton>,
        task: impl Into<TaskRef>,
        options: Option<Options>,
    ) -> RunHandle {
        let task = task.into();
        let cancel = CancelToken::new();
        let mut logger = Logger::from_settings(&automaton.settings);
        let log = logger.stream();

        let token = cancel.clone();
        let join = thread::spawn(move || {
            automaton.run_with_logger(task, options, &mut logger, &token)
        });

        RunHandle { log, cancel, join }
    }
}

/// Result and log output of a finished run
pub struct RunOutcome {
    pub result: Result<()>,
    pub log: LogStream,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// All log text produced by the run
    pub fn output(&self) -> String {
        self.log.text()
    }
}

/// Handle over a run started with [`Automaton::spawn`]
pub struct RunHandle {
    log: LogStream,
    cancel: CancelToken,
    join: JoinHandle<Result<()>>,
}

impl RunHandle {
    /// Live log stream of the run
    pub fn log(&self) -> &LogStream {
        &self.log
    }

    /// Ask the run to stop before its next subtask
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to complete
    pub fn join(self) -> Result<()> {
        match self.join.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Wait for the run, returning its result together with the log
    pub fn wait(self) -> RunOutcome {
        let RunHandle { log, join, .. } = self;
        let result = match join.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        RunOutcome { result, log }
    }
}

/// A resolved task reference
enum Target {
    Task(Arc<TaskDef>),
    Action(Hook),
}

/// State of one run
struct Execution<'a> {
    registry: &'a Registry,
    logger: &'a mut Logger,
    cancel: &'a CancelToken,
    /// Ids of the tasks currently executing, outermost first
    chain: Vec<String>,
}

impl Execution<'_> {
    fn run_root(&mut self, task: &TaskRef, mut options: Options) -> Result<()> {
        let target = self.resolve(task)?;
        if let Target::Task(def) = &target {
            def.apply_defaults(&mut options);
        }
        self.execute(&target, options, 1, None)
    }

    fn run_subtask(&mut self, subtask: &Subtask, parent: &Options, depth: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AutomatonError::Cancelled);
        }

        if subtask.mute {
            self.logger.mute();
        }
        let result = self.enter(subtask, parent, depth);
        if subtask.mute {
            self.logger.unmute();
        }

        match result {
            Err(e) if !subtask.fatal && e.is_recoverable() => {
                tracing::debug!("Ignoring failure of non-fatal task '{}'", subtask.task.label());
                self.logger.break_line(depth);
                self.logger.at(depth).errorln(e.to_string());
                Ok(())
            }
            other => other,
        }
    }

    fn enter(&mut self, subtask: &Subtask, parent: &Options, depth: usize) -> Result<()> {
        if let Some(condition) = &subtask.on {
            let run = evaluate_condition(condition, parent).map_err(|cause| HookError {
                task: subtask.task.label().to_string(),
                stage: HookStage::Condition,
                cause,
            })?;
            if !run {
                tracing::debug!("Skipping task '{}': condition is falsy", subtask.task.label());
                return Ok(());
            }
        }

        let target = self.resolve(&subtask.task)?;
        let passed = interpolate_options(&subtask.options, parent);

        let scope = match &target {
            Target::Task(def) => {
                let mut scope = passed;
                def.apply_defaults(&mut scope);
                scope
            }
            // Actions see their parent's options, overridden by what is passed
            Target::Action(_) => {
                let mut scope = parent.clone();
                for (key, value) in passed {
                    scope.set(key, value);
                }
                scope
            }
        };

        self.execute(&target, scope, depth, subtask.description.as_ref())
    }

    fn execute(
        &mut self,
        target: &Target,
        mut scope: Options,
        depth: usize,
        description: Option<&Description>,
    ) -> Result<()> {
        let id = match target {
            Target::Task(def) => def.id.clone(),
            Target::Action(_) => None,
        };
        if let Some(id) = &id {
            if self.chain.contains(id) {
                let mut chain = self.chain.clone();
                chain.push(id.clone());
                return Err(LookupError::CircularReference(chain.join(" -> ")).into());
            }
        }

        let heading = heading(target, description, &scope)?;
        if !heading.is_empty() {
            self.logger.header(depth, &heading);
        }

        match target {
            Target::Action(action) => {
                let label = if heading.is_empty() { "<action>" } else { heading.as_str() };
                self.call_hook(action, HookStage::Action, &mut scope, depth, label)
            }
            Target::Task(def) => {
                if let Some(id) = &id {
                    self.chain.push(id.clone());
                }

                let result = self.execute_task(def, &mut scope, depth);

                if id.is_some() {
                    self.chain.pop();
                }
                result
            }
        }
    }

    fn execute_task(&mut self, def: &TaskDef, scope: &mut Options, depth: usize) -> Result<()> {
        let label = def.label();

        if let Some(setup) = &def.setup {
            self.call_hook(setup, HookStage::Setup, scope, depth, label)?;
        }

        for subtask in &def.tasks {
            self.run_subtask(subtask, scope, depth + 1)?;
        }

        if let Some(teardown) = &def.teardown {
            self.call_hook(teardown, HookStage::Teardown, scope, depth, label)?;
        }

        Ok(())
    }

    fn call_hook(
        &mut self,
        hook: &Hook,
        stage: HookStage,
        scope: &mut Options,
        depth: usize,
        label: &str,
    ) -> Result<()> {
        let mut ctx = Context::new(&mut *self.logger, depth, label, self.cancel);
        hook.call(scope, &mut ctx).map_err(|cause| {
            HookError {
                task: label.to_string(),
                stage,
                cause,
            }
            .into()
        })
    }

    fn resolve(&self, task: &TaskRef) -> Result<Target> {
        match task {
            TaskRef::Id(id) => Ok(Target::Task(self.registry.lookup(id)?)),
            TaskRef::Inline(def) => {
                validate_task(def)?;
                Ok(Target::Task(Arc::clone(def)))
            }
            TaskRef::Action(hook) => Ok(Target::Action(hook.clone())),
        }
    }
}

/// Header text: the invocation's description, then the task's description,
/// then its name
fn heading(target: &Target, description: Option<&Description>, scope: &Options) -> Result<String> {
    let (label, own, name) = match target {
        Target::Task(def) => (def.label(), def.description.as_ref(), def.name.as_deref()),
        Target::Action(_) => ("<action>", None, None),
    };

    match description.or(own) {
        Some(description) => description.render(scope).map_err(|cause| {
            HookError {
                task: label.to_string(),
                stage: HookStage::Description,
                cause,
            }
            .into()
        }),
        None => Ok(name.unwrap_or(UNNAMED_TASK).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;
    use std::sync::Mutex;

    fn record(log: &Arc<Mutex<Vec<String>>>, entry: &str) -> TaskRef {
        let log = Arc::clone(log);
        let entry = entry.to_string();
        TaskRef::action(move |_, _| {
            log.lock().unwrap().push(entry.clone());
            Ok(())
        })
    }

    #[test]
    fn test_run_inline_task() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let task = TaskDef::new()
            .with_description("Root")
            .task(record(&calls, "a"))
            .task(record(&calls, "b"));

        let outcome = Automaton::new().run(task, None);
        assert!(outcome.is_ok());
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(outcome.output(), "Root\n  ??\n  ??\n");
    }

    #[test]
    fn test_run_unknown_id() {
        let outcome = Automaton::new().run("missing", None);
        assert!(matches!(
            outcome.result,
            Err(AutomatonError::Lookup(LookupError::UnknownTask(ref id))) if id == "missing"
        ));
        assert!(outcome.output().contains("missing"));
    }

    #[test]
    fn test_root_options_and_defaults() {
        let seen = Arc::new(Mutex::new(Options::new()));
        let sink = Arc::clone(&seen);
        let task = TaskDef::new()
            .with_option("mode", crate::runner::OptionDef::new().with_default("0755"))
            .with_option("dest", crate::runner::OptionDef::new())
            .setup(move |opts, _| {
                *sink.lock().unwrap() = opts.clone();
                Ok(())
            });

        let outcome = Automaton::new().run(task, Some(Options::new().with("dest", "out")));
        assert!(outcome.is_ok());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.get_str("dest"), Some("out"));
        assert_eq!(seen.get_str("mode"), Some("0755"));
    }

    #[test]
    fn test_action_inherits_parent_scope() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let task = TaskDef::new()
            .setup(|opts, _| {
                opts.set("name", "world");
                Ok(())
            })
            .subtask(
                Subtask::new(TaskRef::action(move |opts, _| {
                    *sink.lock().unwrap() = opts.get("greeting").cloned();
                    Ok(())
                }))
                .with_option("greeting", "hello {{name}}"),
            );

        assert!(Automaton::new().run(task, None).is_ok());
        assert_eq!(*seen.lock().unwrap(), Some(Value::from("hello world")));
    }

    #[test]
    fn test_circular_reference() {
        let mut automaton = Automaton::new();
        automaton.add(TaskDef::new().with_id("a").task("b")).unwrap();
        automaton.add(TaskDef::new().with_id("b").task("a")).unwrap();

        let outcome = automaton.run("a", None);
        assert!(matches!(
            outcome.result,
            Err(AutomatonError::Lookup(LookupError::CircularReference(ref chain))) if chain == "a -> b -> a"
        ));
    }

    #[test]
    fn test_same_task_twice_in_sequence_is_not_circular() {
        let mut automaton = Automaton::new();
        automaton.add(TaskDef::new().with_id("leaf")).unwrap();
        let outcome = automaton.run(TaskDef::new().task("leaf").task("leaf"), None);
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_cancelled_run_stops_before_next_subtask() {
        let token = CancelToken::new();
        let cancel = token.clone();
        let task = TaskDef::new()
            .action(move |_, _| {
                cancel.cancel();
                Ok(())
            })
            .subtask(
                Subtask::new(TaskRef::action(|_, _| panic!("must not run"))).fatal(false),
            );

        let mut logger = Logger::new();
        let result = Automaton::new().run_with_logger(task, None, &mut logger, &token);
        assert!(matches!(result, Err(AutomatonError::Cancelled)));
    }

    #[test]
    fn test_circular_task_prints_no_header() {
        let mut automaton = Automaton::new();
        automaton
            .add(TaskDef::new().with_id("a").with_name("A").task("b"))
            .unwrap();
        automaton
            .add(TaskDef::new().with_id("b").with_name("B").task("a"))
            .unwrap();

        let outcome = automaton.run("a", None);
        assert!(outcome.result.is_err());
        assert_eq!(
            outcome.output(),
            "A\n  B\nLookup error: Circular task reference: a -> b -> a\n"
        );
    }

    #[test]
    fn test_output_can_be_read_repeatedly() {
        let outcome = Automaton::new().run(TaskDef::new().with_name("Root"), None);
        assert_eq!(outcome.output(), "Root\n");
        assert_eq!(outcome.output(), "Root\n");
        assert_eq!(outcome.log.events().len(), 1);
    }

    #[test]
    fn test_error_line_breaks_open_line() {
        let task = TaskDef::new().action(|_, ctx| {
            ctx.log().info("copying");
            anyhow::bail!("disk full")
        });

        let outcome = Automaton::new().run(task, None);
        assert!(outcome.result.is_err());
        assert_eq!(
            outcome.output(),
            "??\n  ??\n  copying\nTask failed: action of '??' failed: disk full\n"
        );
    }

    #[test]
    fn test_empty_description_suppresses_header() {
        let task = TaskDef::new()
            .with_description("")
            .subtask(Subtask::new(TaskDef::new().with_name("child")));
        let outcome = Automaton::new().run(task, None);
        assert_eq!(outcome.output(), "  child\n");
    }
}
