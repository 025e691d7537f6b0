//! JSON output formatting for tapkit.

use serde::Serialize;
use serde_json::json;

use crate::error::TapkitError;
use crate::features::queue::QueuedOperation;

/// Format a list of operations as JSON
///
/// # Errors
///
/// Returns `TapkitError::Parse` if JSON serialization fails.
pub fn format_operations_json(
    operations: &[QueuedOperation],
    list_name: &str,
) -> Result<String, TapkitError> {
    let output = json!({
        "list": list_name,
        "count": operations.len(),
        "items": operations
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `TapkitError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, TapkitError> {
    Ok(serde_json::to_string_pretty(value)?)
}
