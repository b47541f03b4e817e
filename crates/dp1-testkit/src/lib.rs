//! # DP-1 Testkit
//!
//! Testing utilities for DP-1.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: canonical bytes, digests and signatures computed by
//!   an independent implementation
//! - **Generators**: proptest strategies for JSON values and playlists
//! - **Fixtures**: deterministic signers, trust stores and capsule
//!   directories
//!
//! ## Golden Vectors
//!
//! ```rust
//! use dp1_testkit::vectors::canonical_vectors;
//!
//! for vector in canonical_vectors() {
//!     let bytes = dp1_core::canonicalize_json(vector.input.as_bytes()).unwrap();
//!     assert_eq!(bytes, vector.canonical.as_bytes(), "{}", vector.name);
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use dp1_testkit::fixtures::TestFixture;
//! use dp1_core::Role;
//!
//! let fixture = TestFixture::new();
//! let playlist = fixture.signed_playlist("Signed", &[Role::Curator]);
//! assert!(playlist.has_signature());
//! ```

use std::sync::Once;

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{capsule_dir, sample_item, sample_playlist, TestFixture};
pub use generators::{json_value, playlist, PlaylistParams};
pub use vectors::{canonical_vectors, signed_playlist_vector, verify_all_vectors, CanonicalVector};

static TRACING: Once = Once::new();

/// Install a test-writer `tracing` subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
