//! Storage Abstraction Layer
//!
//! Fetches raw asset bytes by URL, routing on the URL prefix:
//! - `http://` / `https://` → remote fetch (native only)
//! - Everything else → Local filesystem, relative to the asset root
//!
//! URLs ending in `.br` are brotli-compressed on disk/over the wire and are
//! decompressed before being handed back.
//!
//! All calls block; they are meant to run on the decode worker or a direct
//! loader thread, never on the frame loop.

#[cfg(not(target_arch = "wasm32"))]
pub mod http;
pub mod local;

#[cfg(not(target_arch = "wasm32"))]
use http::HttpStorage;
use local::LocalStorage;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;

/// Suffix marking brotli-compressed sources
const BROTLI_SUFFIX: &str = ".br";

/// Storage error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// File or remote resource not found
    #[error("not found: {0}")]
    NotFound(String),
    /// Permission denied
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
    /// Network error (remote URLs only)
    #[error("network error: {0}")]
    Network(String),
    /// Brotli stream was corrupt
    #[error("decompression failed: {0}")]
    Decompress(String),
    /// Scheme not supported on this target
    #[error("unsupported URL: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(e.to_string()),
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(e.to_string()),
            _ => StorageError::Io(e.to_string()),
        }
    }
}

/// Unified read-only storage with URL-based routing
#[derive(Debug, Clone)]
pub struct Storage {
    local: LocalStorage,
    #[cfg(not(target_arch = "wasm32"))]
    remote: HttpStorage,
}

impl Storage {
    /// Storage rooted at the current directory with default HTTP timeout
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// Storage whose relative URLs resolve under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            local: LocalStorage::with_base_dir(root),
            #[cfg(not(target_arch = "wasm32"))]
            remote: HttpStorage::default(),
        }
    }

    /// Override the remote request timeout
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_http_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.remote = HttpStorage::new(timeout);
        self
    }

    fn is_remote(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Fetch the bytes behind a URL, decompressing `.br` sources
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let data = if Self::is_remote(url) {
            self.fetch_remote(url)?
        } else {
            self.local.read(url)?
        };

        if url.ends_with(BROTLI_SUFFIX) {
            decompress(&data)
        } else {
            Ok(data)
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        self.remote.get(url)
    }

    #[cfg(target_arch = "wasm32")]
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported(url.to_string()))
    }

    /// Root directory for relative URLs
    pub fn root(&self) -> &std::path::Path {
        self.local.base_dir()
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompress a brotli stream
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut decompressed = Vec::new();
    brotli::BrotliDecompress(&mut Cursor::new(data), &mut decompressed)
        .map_err(|e| StorageError::Decompress(e.to_string()))?;
    Ok(decompressed)
}
