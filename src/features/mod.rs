//! Feature modules for tapkit.

pub mod queue;
pub mod sync;
