//! Automaton - a task automation engine
//!
//! Tasks are reusable units with declared options, optional setup and
//! teardown hooks, and an ordered list of subtasks. The engine resolves
//! `{{placeholder}}` options against each parent's scope, runs the tree
//! depth-first one task at a time, and streams log output indented by
//! nesting depth.
//!
//! ```rust
//! use automaton::{Automaton, OptionDef, Options, Subtask, TaskDef};
//!
//! let mut automaton = Automaton::new();
//! automaton
//!     .add(
//!         TaskDef::new()
//!             .with_id("greet")
//!             .with_description("Greet {{who}}")
//!             .with_option("who", OptionDef::new().with_default("world")),
//!     )
//!     .unwrap();
//!
//! let task = TaskDef::new()
//!     .with_description("Greetings")
//!     .subtask(Subtask::new("greet").with_option("who", "{{name}}"));
//!
//! let outcome = automaton.run(task, Some(Options::new().with("name", "Ada")));
//! assert!(outcome.is_ok());
//! assert_eq!(outcome.output(), "Greetings\n  Greet Ada\n");
//! ```

// Public modules
pub mod config;
pub mod error;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use config::Settings;
pub use error::{AutomatonError, Result};
pub use runner::{
    Automaton, CancelToken, Condition, Context, Description, Hook, OptionDef, Options, Registry,
    RunHandle, RunOutcome, Subtask, TaskDef, TaskRef,
};
pub use ui::{Level, LogEvent, LogStream, Logger};

/// Current version of Automaton
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
