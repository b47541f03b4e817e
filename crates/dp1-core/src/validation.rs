//! Structural validation of playlists and playlist groups.
//!
//! Validation is purely structural: it never touches keys or the network.
//! Signature checks live in [`crate::chain`].

use serde::Deserialize;

use crate::crypto::LEGACY_SIG_PREFIX;
use crate::error::{HashFormatError, ValidationError};
use crate::hash::{Sha256Digest, SHA256_HEX_LEN};
use crate::playlist::{Playlist, PlaylistGroup, PlaylistItem, SignatureRecord};
use crate::types::is_uuid_v4;

/// Length limits applied by [`PlaylistValidator`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub max_slug_len: usize,
    pub max_title_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_slug_len: 100,
            max_title_len: 500,
        }
    }
}

/// Validates DP-1 documents against a set of limits.
///
/// Construct one per policy and pass it where needed; there is no shared
/// global instance.
#[derive(Debug, Clone, Default)]
pub struct PlaylistValidator {
    limits: ValidationLimits,
}

impl PlaylistValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a playlist's structure.
    pub fn validate_playlist(&self, playlist: &Playlist) -> Result<(), ValidationError> {
        // 1. Version and identity
        if playlist.dp_version.is_empty() {
            return Err(ValidationError::MissingField("dpVersion"));
        }
        if !is_semver(&playlist.dp_version) {
            return Err(ValidationError::InvalidVersion(playlist.dp_version.clone()));
        }
        self.check_uuid("id", &playlist.id)?;
        if let Some(slug) = &playlist.slug {
            self.check_slug(slug)?;
        }
        if let Some(title) = &playlist.title {
            self.check_len("title", title)?;
        }

        // 2. Creation time
        if playlist.created.is_empty() {
            return Err(ValidationError::MissingField("created"));
        }
        check_timestamp("created", &playlist.created)?;

        // 3. Items
        if playlist.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        for item in &playlist.items {
            self.validate_item(item)?;
        }
        if let Some(duration) = playlist.defaults.as_ref().and_then(|d| d.duration) {
            check_duration(duration)?;
        }

        // 4. Signature shapes (not their validity)
        if let Some(signature) = &playlist.signature {
            check_legacy_signature(signature)?;
        }
        if let Some(records) = &playlist.signatures {
            for (index, record) in records.iter().enumerate() {
                check_signature_record(index, record)?;
            }
        }

        Ok(())
    }

    fn validate_item(&self, item: &PlaylistItem) -> Result<(), ValidationError> {
        self.check_uuid("items.id", &item.id)?;
        if let Some(slug) = &item.slug {
            self.check_len("items.slug", slug)?;
        }
        if let Some(title) = &item.title {
            self.check_len("items.title", title)?;
        }
        if item.source.is_empty() {
            return Err(ValidationError::MissingField("items.source"));
        }
        check_url("items.source", &item.source)?;
        if let Some(duration) = item.duration {
            check_duration(duration)?;
        }
        if let Some(reference) = &item.reference {
            check_url("items.ref", reference)?;
        }

        if let Some(repro) = &item.repro {
            if let Some(seed) = &repro.seed {
                let digits = seed.strip_prefix("0x").unwrap_or(seed);
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ValidationError::InvalidHex {
                        field: "repro.seed",
                        value: seed.clone(),
                    });
                }
            }
            for hash in repro.assets_sha256.iter().flatten() {
                check_asset_hash(hash).map_err(|source| ValidationError::InvalidAssetHash {
                    item: item.id.clone(),
                    source,
                })?;
            }
        }

        Ok(())
    }

    /// Validate a playlist group's structure.
    ///
    /// Referenced playlists are not resolved here.
    pub fn validate_group(&self, group: &PlaylistGroup) -> Result<(), ValidationError> {
        if let Some(version) = &group.dp_version {
            if !is_semver(version) {
                return Err(ValidationError::InvalidVersion(version.clone()));
            }
        }
        self.check_uuid("id", &group.id)?;
        if let Some(slug) = &group.slug {
            self.check_slug(slug)?;
        }
        if group.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        self.check_len("title", &group.title)?;
        if group.curator.trim().is_empty() {
            return Err(ValidationError::MissingField("curator"));
        }
        if let Some(created) = &group.created {
            check_timestamp("created", created)?;
        }
        if let Some(cover) = &group.cover_image {
            check_url("coverImage", cover)?;
        }

        if group.playlists.is_empty() {
            return Err(ValidationError::MissingField("playlists"));
        }
        for entry in &group.playlists {
            let parsed = url::Url::parse(entry).map_err(|_| ValidationError::InvalidUrl {
                field: "playlists",
                value: entry.clone(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(ValidationError::InvalidUrl {
                    field: "playlists",
                    value: entry.clone(),
                });
            }
        }

        if let Some(signature) = &group.signature {
            check_legacy_signature(signature)?;
        }

        Ok(())
    }

    fn check_uuid(&self, field: &'static str, value: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::MissingField(field));
        }
        if !is_uuid_v4(value) {
            return Err(ValidationError::InvalidUuid {
                field,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn check_len(&self, field: &'static str, value: &str) -> Result<(), ValidationError> {
        let max = if field.ends_with("slug") {
            self.limits.max_slug_len
        } else {
            self.limits.max_title_len
        };
        if value.chars().count() > max {
            return Err(ValidationError::TooLong { field, max });
        }
        Ok(())
    }

    fn check_slug(&self, slug: &str) -> Result<(), ValidationError> {
        self.check_len("slug", slug)?;
        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidSlug(slug.to_string()));
        }
        Ok(())
    }
}

/// `MAJOR.MINOR.PATCH` with optional `-prerelease` and `+build` suffixes.
fn is_semver(s: &str) -> bool {
    let core = s.split('+').next().unwrap_or(s);
    let core = core.split_once('-').map_or(core, |(c, pre)| {
        if pre.is_empty() {
            ""
        } else {
            c
        }
    });
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars().all(|c| c.is_ascii_digit())
                && (p.len() == 1 || !p.starts_with('0'))
        })
}

fn check_timestamp(field: &'static str, value: &str) -> Result<(), ValidationError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

fn check_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        })
}

fn check_duration(duration: u64) -> Result<(), ValidationError> {
    if duration < 1 {
        return Err(ValidationError::OutOfRange {
            field: "duration",
            min: 1,
            got: duration,
        });
    }
    Ok(())
}

/// Manifest entries must be bare 64-character hex; prefixes are not allowed.
fn check_asset_hash(hash: &str) -> Result<(), HashFormatError> {
    if hash.len() != SHA256_HEX_LEN {
        return Err(HashFormatError::InvalidLength(hash.len()));
    }
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HashFormatError::InvalidHex(hash.to_string()));
    }
    Ok(())
}

fn check_legacy_signature(signature: &str) -> Result<(), ValidationError> {
    let hex_part = signature
        .strip_prefix(LEGACY_SIG_PREFIX)
        .ok_or_else(|| ValidationError::InvalidSignatureFormat(signature.to_string()))?;
    if hex_part.len() != 128 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidSignatureFormat(signature.to_string()));
    }
    Ok(())
}

fn check_signature_record(index: usize, record: &SignatureRecord) -> Result<(), ValidationError> {
    let fail = |reason: &str| ValidationError::InvalidSignatureRecord {
        index,
        reason: reason.to_string(),
    };

    if record.kid.trim().is_empty() {
        return Err(fail("kid is empty"));
    }
    if chrono::DateTime::parse_from_rfc3339(&record.ts).is_err() {
        return Err(fail("ts is not RFC3339"));
    }
    if Sha256Digest::parse_prefixed(&record.payload_hash).is_none() {
        return Err(fail("payload_hash must be sha256:<64 lowercase hex>"));
    }
    if record.sig.is_empty()
        || !record
            .sig
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(fail("sig must be base64url without padding"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{PlaylistItem, Repro};
    use crate::types::{Role, SignatureAlg};

    fn make_playlist() -> Playlist {
        Playlist::new("Test", vec![PlaylistItem::new("https://example.com/a.html", 30)])
    }

    #[test]
    fn test_valid_playlist() {
        PlaylistValidator::default()
            .validate_playlist(&make_playlist())
            .unwrap();
    }

    #[test]
    fn test_semver() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("1.2.3-beta.1+build5"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("01.0.0"));
        assert!(!is_semver("1.0.0-"));
        assert!(!is_semver("v1.0.0"));
    }

    #[test]
    fn test_no_items() {
        let mut playlist = make_playlist();
        playlist.items.clear();
        assert_eq!(
            PlaylistValidator::default().validate_playlist(&playlist),
            Err(ValidationError::NoItems)
        );
    }

    #[test]
    fn test_bad_id_and_timestamp() {
        let validator = PlaylistValidator::default();

        let mut playlist = make_playlist();
        playlist.id = "not-a-uuid".into();
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::InvalidUuid { field: "id", .. })
        ));

        let mut playlist = make_playlist();
        playlist.created = "yesterday".into();
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_zero_duration() {
        let mut playlist = make_playlist();
        playlist.items[0].duration = Some(0);
        assert!(matches!(
            PlaylistValidator::default().validate_playlist(&playlist),
            Err(ValidationError::OutOfRange { min: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_slug_rules() {
        let validator = PlaylistValidator::default();

        let mut playlist = make_playlist();
        playlist.slug = Some("my slug!".into());
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::InvalidSlug(_))
        ));

        playlist.slug = Some("a".repeat(101));
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::TooLong { max: 100, .. })
        ));

        playlist.slug = Some("ok_slug-1234".into());
        validator.validate_playlist(&playlist).unwrap();
    }

    #[test]
    fn test_asset_hashes_checked() {
        let mut playlist = make_playlist();
        playlist.items[0].repro = Some(Repro {
            assets_sha256: Some(vec!["abc".into()]),
            ..Default::default()
        });
        assert!(matches!(
            PlaylistValidator::default().validate_playlist(&playlist),
            Err(ValidationError::InvalidAssetHash {
                source: HashFormatError::InvalidLength(3),
                ..
            })
        ));
    }

    #[test]
    fn test_signature_shapes() {
        let validator = PlaylistValidator::default();

        let mut playlist = make_playlist();
        playlist.signature = Some("rsa:abcd".into());
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::InvalidSignatureFormat(_))
        ));

        let mut playlist = make_playlist();
        playlist.signatures = Some(vec![SignatureRecord {
            alg: SignatureAlg::Ed25519,
            kid: "did:key:z6Mk".into(),
            ts: "2025-01-01T00:00:00Z".into(),
            payload_hash: "sha256:XYZ".into(),
            role: Role::Curator,
            sig: "abc".into(),
        }]);
        assert!(matches!(
            validator.validate_playlist(&playlist),
            Err(ValidationError::InvalidSignatureRecord { index: 0, .. })
        ));
    }

    #[test]
    fn test_group_validation() {
        let validator = PlaylistValidator::default();
        let group = PlaylistGroup::new("G", "Curator", vec!["https://a.example/p/1".into()]);
        validator.validate_group(&group).unwrap();

        let mut bad = group.clone();
        bad.playlists = vec!["ftp://a.example/p".into()];
        assert!(matches!(
            validator.validate_group(&bad),
            Err(ValidationError::InvalidUrl { .. })
        ));

        let mut empty = group;
        empty.playlists.clear();
        assert_eq!(
            validator.validate_group(&empty),
            Err(ValidationError::MissingField("playlists"))
        );
    }
}
