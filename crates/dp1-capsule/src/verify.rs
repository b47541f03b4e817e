//! Capsule verification: does a set of assets match a playlist's manifest?

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use dp1_core::Playlist;

use crate::error::{CapsuleError, Result};
use crate::hashlist::{compare_hashes, parse_hash_list};
use crate::scan::{sha256_dir_with, HashResult, ScanConfig};

/// What the expected hashes are checked against.
#[derive(Debug, Clone)]
pub enum VerificationTarget {
    /// Hash every regular file under this directory.
    Directory(PathBuf),
    /// A delimited hash list, parsed with [`parse_hash_list`].
    HashList(String),
    /// Hashes already split into entries.
    Hashes(Vec<String>),
}

/// Outcome of a capsule verification.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    /// Files scanned, including those that failed to hash. Zero outside
    /// directory mode.
    pub total_files: usize,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    /// Per-file results in directory mode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<HashResult>,
}

impl VerificationResult {
    /// Files whose hashing failed.
    pub fn failed_files(&self) -> impl Iterator<Item = &HashResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }

    /// Turn an unsuccessful comparison into [`CapsuleError::HashMismatch`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(CapsuleError::HashMismatch {
                missing: self.missing,
                extra: self.extra,
            })
        }
    }
}

/// Compares expected hash manifests against directories or hash lists.
#[derive(Debug, Clone, Default)]
pub struct CapsuleVerifier {
    config: ScanConfig,
}

impl CapsuleVerifier {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Verify `expected` against `target`.
    ///
    /// An empty expected set, or a hash-list target with no valid entries,
    /// is an error rather than a vacuous success.
    pub fn verify<S: AsRef<str>>(
        &self,
        expected: &[S],
        target: VerificationTarget,
    ) -> Result<VerificationResult> {
        if expected.is_empty() {
            return Err(CapsuleError::NoValidHashes("expected hashes"));
        }

        let (actual, results) = match target {
            VerificationTarget::Directory(dir) => {
                let results = sha256_dir_with(&dir, &self.config)?;
                let actual: Vec<String> = results
                    .iter()
                    .filter(|r| r.error.is_none())
                    .filter_map(|r| r.sha256.clone())
                    .collect();
                (actual, results)
            }
            VerificationTarget::HashList(input) => {
                let actual = parse_hash_list(&input);
                if actual.is_empty() {
                    return Err(CapsuleError::NoValidHashes("hash list"));
                }
                (actual, Vec::new())
            }
            VerificationTarget::Hashes(hashes) => {
                let actual: Vec<String> = hashes.iter().map(|h| h.trim().to_string()).collect();
                if actual.is_empty() {
                    return Err(CapsuleError::NoValidHashes("hash list"));
                }
                (actual, Vec::new())
            }
        };

        let comparison = compare_hashes(expected.iter().map(|h| h.as_ref()), &actual);
        debug!(
            matched = comparison.matched.len(),
            missing = comparison.missing.len(),
            extra = comparison.extra.len(),
            "compared hash sets"
        );

        let result = VerificationResult {
            success: comparison.is_success(),
            total_files: results.len(),
            matched: comparison.matched,
            missing: comparison.missing,
            extra: comparison.extra,
            results,
        };
        info!(success = result.success, files = result.total_files, "capsule verification finished");
        Ok(result)
    }

    /// Verify the assets declared by every item's `repro.assetsSHA256`.
    pub fn verify_playlist(
        &self,
        playlist: &Playlist,
        target: VerificationTarget,
    ) -> Result<VerificationResult> {
        self.verify(&playlist.asset_hashes(), target)
    }
}
