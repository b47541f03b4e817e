//! DP-1 document model: playlists, items, groups, and signature records.
//!
//! Every struct keeps unknown fields in an `extra` bag so that a document
//! survives a parse/serialize round trip with its canonical form, and
//! therefore its signatures, intact. Optional fields are omitted rather
//! than serialized as `null` for the same reason.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::canonical::{self, fields};
use crate::error::{CanonicalizationError, CoreError};
use crate::hash::{sha256, Sha256Digest};
use crate::types::{License, Role, SignatureAlg};

/// Current DP-1 protocol version stamped on newly created documents.
pub const DP_VERSION: &str = "1.0.0";

/// Fields not modelled explicitly, kept verbatim.
pub type ExtraFields = Map<String, Value>;

/// Display preferences for an item, a playlist's defaults, or an override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayPrefs {
    /// `fit`, `fill`, `stretch`, or `auto`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<String>,
    /// CSS color or `transparent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<Margin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A margin given either as a CSS length (`"5%"`) or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Margin {
    Length(String),
    Number(Number),
}

/// Values inherited by every item of a playlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayPrefs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Per-item overrides of inherited values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayPrefs>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Reproduction data; `assets_sha256` is the capsule hash manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repro {
    #[serde(
        default,
        rename = "engineVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_version: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(
        default,
        rename = "assetsSHA256",
        skip_serializing_if = "Option::is_none"
    )]
    pub assets_sha256: Option<Vec<String>>,
    #[serde(default, rename = "frameHash", skip_serializing_if = "Option::is_none")]
    pub frame_hash: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvenanceType {
    #[serde(rename = "onChain")]
    OnChain,
    #[serde(rename = "seriesRegistry")]
    SeriesRegistry,
    #[serde(rename = "offChainURI")]
    OffChainUri,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(rename = "type")]
    pub kind: ProvenanceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A single artwork entry in a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: String,
    /// Seconds; falls back to the playlist defaults when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ItemOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayPrefs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repro: Option<Repro>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl PlaylistItem {
    /// Create an item with a fresh v4 ID.
    pub fn new(source: impl Into<String>, duration: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            slug: None,
            title: None,
            source: source.into(),
            duration: Some(duration),
            license: None,
            reference: None,
            overrides: None,
            display: None,
            repro: None,
            provenance: None,
            extra: ExtraFields::new(),
        }
    }
}

/// One entry of a playlist's `signatures` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub alg: SignatureAlg,
    /// DID-style key identifier.
    pub kid: String,
    /// RFC3339 signing time, kept as written.
    pub ts: String,
    /// `sha256:<hex>` of the playlist with all signature fields removed.
    pub payload_hash: String,
    pub role: Role,
    /// Base64url without padding.
    pub sig: String,
}

/// A DP-1 playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(rename = "dpVersion")]
    pub dp_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    /// Legacy single signature, `ed25519:<hex>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<SignatureRecord>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Playlist {
    /// Create an unsigned playlist with a fresh v4 ID and the current time.
    pub fn new(title: impl Into<String>, items: Vec<PlaylistItem>) -> Self {
        Self {
            dp_version: DP_VERSION.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            slug: None,
            title: Some(title.into()),
            created: now_rfc3339(),
            defaults: None,
            items,
            signature: None,
            signatures: None,
            extra: ExtraFields::new(),
        }
    }

    /// Parse a playlist from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_value(&self) -> Result<Value, CanonicalizationError> {
        serde_json::to_value(self).map_err(|e| CanonicalizationError::NotRepresentable(e.to_string()))
    }

    /// Canonical bytes of the whole document, signatures included.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CanonicalizationError> {
        canonical::canonicalize(&self.to_value()?)
    }

    /// SHA-256 over the full canonical form; identifies duplicate
    /// documents regardless of field order.
    pub fn content_hash(&self) -> Result<Sha256Digest, CanonicalizationError> {
        Ok(sha256(&self.canonical_bytes()?))
    }

    /// Bytes covered by the legacy `signature`: only that field is removed.
    pub fn legacy_signable_bytes(&self) -> Result<Vec<u8>, CanonicalizationError> {
        signable_bytes(&self.to_value()?, &[fields::SIGNATURE])
    }

    /// Bytes covered by `payload_hash`: both signature fields are removed.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CanonicalizationError> {
        signable_bytes(&self.to_value()?, &[fields::SIGNATURE, fields::SIGNATURES])
    }

    pub fn payload_hash(&self) -> Result<Sha256Digest, CanonicalizationError> {
        Ok(sha256(&self.payload_bytes()?))
    }

    pub fn has_signature(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
            || self.signatures.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Every item's declared capsule hashes, in item order.
    pub fn asset_hashes(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| item.repro.as_ref())
            .filter_map(|repro| repro.assets_sha256.as_ref())
            .flatten()
            .cloned()
            .collect()
    }

    /// Drop both signature representations.
    pub fn clear_signatures(&mut self) {
        self.signature = None;
        self.signatures = None;
    }
}

/// A curated collection of playlists referenced by URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistGroup {
    #[serde(
        default,
        rename = "dpVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub dp_version: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    pub curator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub playlists: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, rename = "coverImage", skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl PlaylistGroup {
    pub fn new(
        title: impl Into<String>,
        curator: impl Into<String>,
        playlists: Vec<String>,
    ) -> Self {
        Self {
            dp_version: Some(DP_VERSION.to_string()),
            id: uuid::Uuid::new_v4().to_string(),
            slug: None,
            title: title.into(),
            curator: curator.into(),
            summary: None,
            playlists,
            created: Some(now_rfc3339()),
            cover_image: None,
            signature: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_value(&self) -> Result<Value, CanonicalizationError> {
        serde_json::to_value(self).map_err(|e| CanonicalizationError::NotRepresentable(e.to_string()))
    }

    /// Bytes covered by the group's `signature`.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CanonicalizationError> {
        signable_bytes(&self.to_value()?, &[fields::SIGNATURE])
    }
}

/// Canonical bytes of `value` with the named top-level fields removed.
pub fn signable_bytes(value: &Value, strip: &[&str]) -> Result<Vec<u8>, CanonicalizationError> {
    canonical::canonicalize(&canonical::strip_fields(value, strip))
}

/// Current UTC time in the RFC3339 form used for `created` and `ts`.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
