//! Path resolution for tapkit configuration and data files.
//!
//! All tapkit data is stored in `~/.tapkit/`:
//! - `config.yaml` - Main configuration file
//! - `tapkit.db` - SQLite key-value store backing the offline queue
//!
//! The root can be overridden with the `TAPKIT_HOME` environment variable.

use std::path::PathBuf;

use crate::error::TapkitError;

/// Paths to tapkit configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.tapkit/`
    pub root: PathBuf,
    /// Config file: `~/.tapkit/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.tapkit/tapkit.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on `TAPKIT_HOME` or the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `TAPKIT_HOME` nor `HOME` is set.
    pub fn new() -> Result<Self, TapkitError> {
        if let Ok(home) = std::env::var("TAPKIT_HOME") {
            return Ok(Self::with_root(PathBuf::from(home)));
        }

        let home = std::env::var("HOME").map_err(|_| {
            TapkitError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".tapkit")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("tapkit.db"),
            root,
        }
    }

    /// Ensure the root directory exists, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), TapkitError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                TapkitError::Config(format!(
                    "Failed to create directory {:?}: {}",
                    self.root, e
                ))
            })?;
        }

        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| {
            // Fallback to current directory if home cannot be determined
            Self::with_root(PathBuf::from(".tapkit"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-tapkit");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("tapkit.db"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested").join("tapkit"));

        paths.ensure_dirs().unwrap();

        assert!(paths.root.exists());
    }
}
