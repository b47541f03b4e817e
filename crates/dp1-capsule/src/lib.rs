//! # DP-1 Capsule
//!
//! Hashing and verification of offline asset bundles ("capsules") against
//! the `repro.assetsSHA256` manifests carried by DP-1 playlists.
//!
//! ## Key Types
//!
//! - [`sha256_dir`] - parallel hashing of every regular file in a directory
//! - [`parse_hash_list`] / [`compare_hashes`] - hash list handling
//! - [`CapsuleVerifier`] - expected hashes vs a directory or a hash list
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dp1_capsule::{CapsuleVerifier, VerificationTarget};
//!
//! fn example(expected: &[String]) -> dp1_capsule::Result<()> {
//!     let result = CapsuleVerifier::default()
//!         .verify(expected, VerificationTarget::Directory("./capsule".into()))?
//!         .into_result()?;
//!     println!("{} files matched", result.matched.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod hashlist;
pub mod scan;
pub mod verify;

pub use error::{CapsuleError, Result};
pub use hashlist::{compare_hashes, format_hash_list, hash_preview, parse_hash_list, HashComparison};
pub use scan::{sha256_dir, sha256_dir_with, Executor, HashResult, ScanConfig, DEFAULT_MAX_WORKERS};
pub use verify::{CapsuleVerifier, VerificationResult, VerificationTarget};
