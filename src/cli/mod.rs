//! Command-line interface for tapkit.

pub mod args;
pub mod commands;
