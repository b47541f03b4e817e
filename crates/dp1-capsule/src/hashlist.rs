//! Parsing and comparing lists of SHA-256 hashes.

use std::collections::BTreeSet;

use serde::Serialize;

use dp1_core::hash::validate_hash_format;

/// Extract valid SHA-256 hashes from a delimited string.
///
/// Accepts `a,b,c`, `a:b:c` and `[a,b,c]`, and also tolerates `;`, spaces,
/// tabs and newlines between entries. Entries that are not 64 hex
/// characters (after stripping `0x`) are dropped without error, so an empty
/// result means no valid hash was supplied.
pub fn parse_hash_list(input: &str) -> Vec<String> {
    input
        .split(|c: char| matches!(c, ',' | ':' | ';' | '\n' | '\r' | '\t' | ' '))
        .map(|part| part.trim().trim_matches(|c: char| "[](){}".contains(c)))
        .filter(|part| !part.is_empty())
        .filter_map(|part| validate_hash_format(part).ok())
        .collect()
}

/// Set comparison of expected and actual hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashComparison {
    /// Present on both sides.
    pub matched: Vec<String>,
    /// Expected but not found.
    pub missing: Vec<String>,
    /// Found but not expected.
    pub extra: Vec<String>,
}

impl HashComparison {
    pub fn is_success(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compare two hash lists case-insensitively. All three outputs are sorted
/// and free of duplicates.
pub fn compare_hashes<E, A>(expected: E, actual: A) -> HashComparison
where
    E: IntoIterator,
    E::Item: AsRef<str>,
    A: IntoIterator,
    A::Item: AsRef<str>,
{
    let expected: BTreeSet<String> = expected
        .into_iter()
        .map(|h| h.as_ref().to_ascii_lowercase())
        .collect();
    let actual: BTreeSet<String> = actual
        .into_iter()
        .map(|h| h.as_ref().to_ascii_lowercase())
        .collect();

    HashComparison {
        matched: expected.intersection(&actual).cloned().collect(),
        missing: expected.difference(&actual).cloned().collect(),
        extra: actual.difference(&expected).cloned().collect(),
    }
}

/// First 16 characters of a hash followed by `...`, for display.
pub fn hash_preview(hash: &str) -> String {
    match hash.char_indices().nth(16) {
        Some((idx, _)) => format!("{}...", &hash[..idx]),
        None => hash.to_string(),
    }
}

/// Comma-separated list for display, or `none` when empty.
pub fn format_hash_list<S: AsRef<str>>(hashes: &[S]) -> String {
    if hashes.is_empty() {
        return "none".to_string();
    }
    hashes
        .iter()
        .map(|h| h.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}
