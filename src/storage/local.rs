//! Local filesystem storage backend

use super::StorageError;
use std::path::{Path, PathBuf};

/// Local filesystem storage backend
///
/// Resolves relative URLs against a base directory. Absolute paths are used
/// as-is.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Base directory for relative paths (usually the asset root)
    base_dir: PathBuf,
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage {
    /// Create a new local storage backend rooted at the current directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }

    /// Create a local storage backend with a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a path relative to the base directory
    fn resolve(&self, path: &str) -> PathBuf {
        let path = path.strip_prefix("file://").unwrap_or(path);
        self.base_dir.join(path)
    }

    /// Read a file
    pub fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path);
        std::fs::read(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(full_path.display().to_string()),
            _ => StorageError::from(e),
        })
    }
}
