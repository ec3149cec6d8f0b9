//! Task execution engine
//!
//! This module handles option interpolation, task resolution and the
//! depth-first execution of task trees.

pub mod context;
pub mod engine;
pub mod interpolate;
pub mod options;
pub mod registry;
pub mod task;
pub mod when;

// Re-export main types
pub use context::*;
pub use engine::*;
pub use interpolate::*;
pub use options::*;
pub use registry::*;
pub use task::*;
pub use when::*;
