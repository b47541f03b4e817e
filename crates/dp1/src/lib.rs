//! # DP-1
//!
//! Signed, content-addressable playlists for time-based digital art, with
//! a registry that keeps ID, slug and group-membership indexes in sync.
//!
//! ## Overview
//!
//! - **Canonical form**: JCS-style JSON followed by one newline, the basis
//!   of every hash and signature
//! - **Signatures**: legacy `ed25519:<hex>` or role-based `signatures`
//!   chains checked against a trust policy
//! - **Capsules**: SHA-256 manifests verified against asset directories
//! - **Registry**: dual-indexed storage with self-hosted loop avoidance
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dp1::{Registry, RegistryConfig, SelfHostedOrigin};
//! use dp1::core::{Playlist, PlaylistItem};
//! use dp1::store::SqliteKv;
//!
//! async fn example() -> dp1::Result<()> {
//!     let store = SqliteKv::open("registry.db")?;
//!     let config = RegistryConfig::default()
//!         .with_self_hosted(SelfHostedOrigin::new("registry.example"));
//!     let registry = Registry::with_http(store, config)?;
//!
//!     let playlist = Playlist::new(
//!         "Genesis",
//!         vec![PlaylistItem::new("https://art.example/genesis", 300)],
//!     );
//!     let created = registry.create_playlist(playlist).await?;
//!     assert!(registry.get_playlist(&created.id).await?.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `dp1::core` - canonical form, hashing, document model, signatures
//! - `dp1::store` - key-value storage and SQLite
//! - `dp1::capsule` - capsule hashing and verification
//! - `dp1::fetch` - remote playlist fetching

pub mod config;
pub mod error;
pub mod keys;
pub mod registry;
pub mod resolve;
pub mod signer;
pub mod slug;

// Re-export component crates
pub use dp1_capsule as capsule;
pub use dp1_core as core;
pub use dp1_fetch as fetch;
pub use dp1_store as store;

// Re-export main types for convenience
pub use config::{RegistryConfig, SelfHostedOrigin, MAX_PAGE_SIZE};
pub use error::{RegistryError, Result};
pub use registry::{ListQuery, Page, ReconcileReport, Registry};
pub use resolve::{Reference, ResolvedReference};
pub use signer::ServerSigner;
pub use slug::generate_slug;

// Re-export commonly used core types
pub use dp1_core::{
    canonicalize, Keypair, Playlist, PlaylistGroup, PlaylistItem, Role, SignatureRecord,
    SignatureVerifier, TrustPolicy, TrustStore,
};
