//! Command implementations for the tapkit CLI.

pub mod completions;
pub mod queue;

pub use completions::completions;
pub use queue::queue;
