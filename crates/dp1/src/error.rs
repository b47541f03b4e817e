//! Error types for the registry.

use dp1_core::{CanonicalizationError, CoreError, SigError, ValidationError};
use dp1_fetch::FetchError;
use dp1_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Remote fetch error outside reference resolution.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Structural validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Signing or signature verification error.
    #[error("signature error: {0}")]
    Signature(#[from] SigError),

    /// Canonicalization error.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A group references a playlist that could not be resolved or
    /// validated. The whole save is rejected.
    #[error("playlist reference {url} could not be resolved: {reason}")]
    ReferenceUnresolvable { url: String, reason: String },

    /// The record to update or delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored record could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<CoreError> for RegistryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Decode(msg) => RegistryError::Serialization(msg),
            CoreError::Canonicalization(e) => RegistryError::Canonicalization(e),
            CoreError::Validation(e) => RegistryError::Validation(e),
            CoreError::Signature(e) => RegistryError::Signature(e),
        }
    }
}

impl RegistryError {
    pub(crate) fn unresolvable(url: &str, reason: impl std::fmt::Display) -> Self {
        RegistryError::ReferenceUnresolvable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
