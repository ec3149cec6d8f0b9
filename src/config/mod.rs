//! Configuration parsing and validation
//!
//! This module handles engine settings (automaton.yml), YAML task documents
//! and validation of task structure.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
