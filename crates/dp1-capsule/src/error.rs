//! Error types for capsule verification.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a capsule operation.
///
/// Failures hashing an individual file are not errors; they are recorded on
/// that file's [`crate::HashResult`].
#[derive(Debug, Error)]
pub enum CapsuleError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A hash list was empty after dropping invalid entries.
    #[error("no valid hashes in {0}")]
    NoValidHashes(&'static str),

    #[error("capsule hash mismatch: {} missing, {} extra", .missing.len(), .extra.len())]
    HashMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },
}

/// Result type for capsule operations.
pub type Result<T> = std::result::Result<T, CapsuleError>;
