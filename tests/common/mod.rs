//! Common test utilities

#![allow(dead_code)]

use automaton::{Context, Options, TaskRef};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Shared list that actions append to, in execution order
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Action that appends `entry` to the journal
pub fn record(journal: &Journal, entry: &str) -> TaskRef {
    let journal = Arc::clone(journal);
    let entry = entry.to_string();
    TaskRef::action(move |_opts: &mut Options, _ctx: &mut Context<'_>| {
        journal.lock().unwrap().push(entry.clone());
        Ok(())
    })
}

/// Action that always fails
pub fn failing(message: &str) -> TaskRef {
    let message = message.to_string();
    TaskRef::action(move |_, _| Err(anyhow::anyhow!(message.clone())))
}

/// Create a temporary directory holding the given task files
pub fn create_task_dir(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content).unwrap();
    }
    temp_dir
}
