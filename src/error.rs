//! Error types
//!
//! `AssetError` is what a model request rejects with. Every variant maps to
//! a distinct [`ErrorKind`] so callers can branch without string matching.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors a model request can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    /// The logical name is not in the registry. Raised before any I/O.
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    /// No decode worker exists in this runtime (or it has stopped).
    #[error("decode worker unavailable")]
    WorkerUnavailable,

    /// The worker reported a decode error.
    #[error("decode failed: {0}")]
    DecodeFailure(String),

    /// Shallow geometry or raster data violated the transfer invariants.
    #[error("malformed transfer: {0}")]
    TransferError(String),

    /// The request's cancellation token fired before delivery.
    #[error("request cancelled")]
    Cancelled,

    /// Fetching the source file failed (direct path).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Discriminant of [`AssetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownAsset,
    WorkerUnavailable,
    DecodeFailure,
    TransferError,
    Cancelled,
    Storage,
}

impl AssetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssetError::UnknownAsset(_) => ErrorKind::UnknownAsset,
            AssetError::WorkerUnavailable => ErrorKind::WorkerUnavailable,
            AssetError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            AssetError::TransferError(_) => ErrorKind::TransferError,
            AssetError::Cancelled => ErrorKind::Cancelled,
            AssetError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Errors from loading configuration files and registry manifests.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid RON in {path}: {message}")]
    Ron { path: String, message: String },

    #[error("invalid JSON in {path}: {message}")]
    Json { path: String, message: String },

    #[error("asset '{0}' is registered twice")]
    DuplicateAsset(String),
}
