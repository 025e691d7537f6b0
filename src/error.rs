//! Error types for tapkit.

use thiserror::Error;

/// Errors that can occur in tapkit.
#[derive(Debug, Error)]
pub enum TapkitError {
    /// Durable storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration problem (missing home, bad YAML, invalid argument).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested action is not available in this build.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A collaborator failed to execute an operation.
    #[error("Handler error: {0}")]
    Handler(String),

    /// JSON serialization or parsing failure.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = TapkitError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = TapkitError::NotFound("operation 42".to_string());
        assert_eq!(err.to_string(), "Not found: operation 42");
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TapkitError = parse_err.into();
        assert!(matches!(err, TapkitError::Parse(_)));
    }
}
