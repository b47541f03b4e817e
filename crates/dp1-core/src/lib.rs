//! # DP-1 Core
//!
//! Integrity primitives for DP-1 playlists: canonical serialization, SHA-256
//! hashing, the document model, structural validation, and signature-chain
//! verification.
//!
//! This crate performs no networking and no storage. Key material for
//! signature chains is supplied through the [`KeyResolver`] trait.
//!
//! ## Key Types
//!
//! - [`Playlist`] / [`PlaylistGroup`] - DP-1 documents
//! - [`SignatureRecord`] - one entry of a role-based signature chain
//! - [`TrustPolicy`] / [`SignatureVerifier`] - what a chain must prove
//! - [`PlaylistValidator`] - structural checks
//!
//! ## Canonicalization
//!
//! All hashing and signing runs over JCS canonical JSON followed by a single
//! newline. See the [`canonical`] module.

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod playlist;
pub mod types;
pub mod validation;

pub use canonical::{canonicalize, canonicalize_json, canonicalize_serializable, strip_fields};
pub use chain::{
    sign_legacy, sign_record, verify_chain, verify_chain_at, verify_legacy, verify_payload_at,
    verify_playlist, verify_playlist_at, verify_playlist_json, KeyResolver, ResolvedKey,
    SignatureOutcome, SignatureVerifier, SignedPayload, TrustPolicy, TrustStore, VerifiedRoles,
};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{
    CanonicalizationError, CoreError, HashFormatError, Result, SigError, ValidationError,
};
pub use hash::{sha256, sha256_base64, sha256_file, sha256_hex, validate_hash_format, Sha256Digest};
pub use playlist::{
    Defaults, DisplayPrefs, ItemOverride, Playlist, PlaylistGroup, PlaylistItem, Provenance,
    ProvenanceType, Repro, SignatureRecord, DP_VERSION,
    now_rfc3339,
};
pub use types::{looks_like_uuid, License, Role, SignatureAlg};
pub use validation::{PlaylistValidator, ValidationLimits};
