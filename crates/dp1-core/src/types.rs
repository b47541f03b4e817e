//! Small shared types: signer roles, signature algorithms, licenses, and
//! identifier shape detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The capacity in which a signer attests to a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Curator,
    Feed,
    Agent,
    Institution,
    Licensor,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Curator => "curator",
            Self::Feed => "feed",
            Self::Agent => "agent",
            Self::Institution => "institution",
            Self::Licensor => "licensor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature algorithm named by a signature record's `alg` field.
///
/// Unknown names are kept rather than rejected at parse time so that
/// verification can report them as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignatureAlg {
    Ed25519,
    Eip191,
    /// `ecdsa-<curve>`, e.g. `ecdsa-p256`.
    Ecdsa(String),
    Other(String),
}

impl SignatureAlg {
    /// Whether the name belongs to the DP-1 algorithm family.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for SignatureAlg {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ed25519" => Self::Ed25519,
            "eip191" => Self::Eip191,
            _ => match s.strip_prefix("ecdsa-") {
                Some(curve) if !curve.is_empty() => Self::Ecdsa(curve.to_string()),
                _ => Self::Other(s),
            },
        }
    }
}

impl From<SignatureAlg> for String {
    fn from(alg: SignatureAlg) -> Self {
        alg.to_string()
    }
}

impl fmt::Display for SignatureAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => f.write_str("ed25519"),
            Self::Eip191 => f.write_str("eip191"),
            Self::Ecdsa(curve) => write!(f, "ecdsa-{}", curve),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Access model of a playlist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum License {
    Open,
    Token,
    Subscription,
}

impl FromStr for License {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "token" => Ok(Self::Token),
            "subscription" => Ok(Self::Subscription),
            other => Err(format!("unknown license: {}", other)),
        }
    }
}

/// Whether `s` has the hyphenated 8-4-4-4-12 hex shape of a UUID.
///
/// Identifier routing is shape based: anything else is treated as a slug.
pub fn looks_like_uuid(s: &str) -> bool {
    s.len() == 36
        && s.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Whether `s` is a version-4 UUID in hyphenated form.
pub fn is_uuid_v4(s: &str) -> bool {
    looks_like_uuid(s)
        && uuid::Uuid::parse_str(s)
            .map(|u| u.get_version_num() == 4)
            .unwrap_or(false)
}
