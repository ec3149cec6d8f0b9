//! Execution context handed to task hooks
//!
//! The context gives a hook access to the run's logger at the depth of the
//! task it belongs to, and to the run's cancellation state.

use crate::ui::{Logger, TaskLog};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Context passed to setup, action and teardown hooks
pub struct Context<'a> {
    logger: &'a mut Logger,
    depth: usize,
    task: &'a str,
    cancel: &'a CancelToken,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        logger: &'a mut Logger,
        depth: usize,
        task: &'a str,
        cancel: &'a CancelToken,
    ) -> Self {
        Context {
            logger,
            depth,
            task,
            cancel,
        }
    }

    /// Logger bound to this task's depth
    pub fn log(&mut self) -> TaskLog<'_> {
        self.logger.at(self.depth)
    }

    /// Nesting depth of the task (the root task is at depth 1)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Label of the task owning the hook
    pub fn task(&self) -> &str {
        self.task
    }

    /// Whether the run has been asked to stop
    ///
    /// Long-running hooks may poll this to bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Shared flag used to cancel a run between subtasks
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
