//! Human-readable slugs.
//!
//! A slug is the title reduced to `[a-z0-9-]` plus a random four digit
//! suffix. Collisions are unlikely but possible; a slug is an alias, never
//! an identity.

use rand::Rng;

/// Maximum slug length accepted by validation.
pub const MAX_SLUG_LEN: usize = 100;

const SUFFIX_LEN: usize = 5;
const FALLBACK: &str = "playlist";

/// Generate a slug from `title`.
pub fn generate_slug(title: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{}-{:04}", slug_base(title), suffix)
}

/// The deterministic part of a slug: lowercase alphanumerics joined by
/// single hyphens, truncated to leave room for the suffix.
pub fn slug_base(title: &str) -> String {
    let mut base = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }

    base.truncate(MAX_SLUG_LEN - SUFFIX_LEN);
    let trimmed = base.trim_end_matches('-');
    if trimmed.is_empty() {
        FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}
