//! Error types for the DP-1 core.

use thiserror::Error;

use crate::types::Role;

/// Canonicalization failed: the input has no JSON representation.
///
/// This is always fatal. A value that cannot be canonicalized cannot be
/// hashed or signed, so callers must never fall back to a lossy encoding.
#[derive(Debug, Error)]
pub enum CanonicalizationError {
    #[error("value is not representable as JSON: {0}")]
    NotRepresentable(String),

    #[error("non-finite number cannot be canonicalized")]
    NonFiniteNumber,

    #[error("input is not valid JSON: {0}")]
    InvalidJson(String),
}

/// A hash string did not have the expected SHA-256 shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashFormatError {
    #[error("invalid hash length: expected 64 characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex characters in hash: {0}")]
    InvalidHex(String),
}

/// Structural validation errors for playlists and playlist groups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid UUID format for field {field}: {value}")]
    InvalidUuid { field: &'static str, value: String },

    #[error("invalid semantic version format for dpVersion: {0}")]
    InvalidVersion(String),

    #[error("invalid timestamp format for field {field}, expected RFC3339: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("playlist must contain at least one item")]
    NoItems,

    #[error("invalid URL format for field {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("field {field} must be at least {min}, got {got}")]
    OutOfRange { field: &'static str, min: u64, got: u64 },

    #[error("field {field} exceeds maximum length of {max}")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("field {field} must be hexadecimal: {value}")]
    InvalidHex { field: &'static str, value: String },

    #[error("invalid asset hash in item {item}: {source}")]
    InvalidAssetHash {
        item: String,
        #[source]
        source: HashFormatError,
    },

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid signature record {index}: {reason}")]
    InvalidSignatureRecord { index: usize, reason: String },
}

/// Signature verification errors.
///
/// Each variant is distinguishable so callers can log precisely. End users
/// should usually see [`SigError::user_message`] instead.
#[derive(Debug, Error)]
pub enum SigError {
    #[error("signature verification failed")]
    SigInvalid,

    #[error("payload hash mismatch: expected {expected}, got {actual}")]
    PayloadHashMismatch { expected: String, actual: String },

    #[error("key resolution failed for {kid}: {reason}")]
    KeyResolutionFailed { kid: String, reason: String },

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("playlist carries no signature")]
    Unsigned,

    #[error("trust policy not satisfied, missing roles: {missing:?}")]
    InsufficientRoles { missing: Vec<Role> },

    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl SigError {
    /// The message to present to end users, identical for every variant.
    pub fn user_message(&self) -> &'static str {
        "invalid signature"
    }
}

/// Top-level errors for core operations that parse or prepare documents.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("decoding error: {0}")]
    Decode(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("signature error: {0}")]
    Signature(#[from] SigError),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Decode(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
