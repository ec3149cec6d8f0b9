//! Log output
//!
//! This module provides the depth-aware logger and the sinks it writes to.

pub mod logger;
pub mod sink;

// Re-export main types
pub use logger::*;
pub use sink::*;
