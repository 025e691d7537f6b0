//! Output formatting for tapkit.

pub mod json;
pub mod pretty;

pub use json::{format_operations_json, to_json};
pub use pretty::{format_operation_pretty, format_operations_pretty, format_stats_pretty};
