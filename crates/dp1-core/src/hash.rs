//! SHA-256 hashing over bytes, files, and base64 content.
//!
//! Hex output is always lowercase and exactly 64 characters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{CoreError, HashFormatError};

/// Prefix used by DP-1 for self-describing digests (`payload_hash`).
pub const SHA256_PREFIX: &str = "sha256:";

/// Length of a SHA-256 digest in hex characters.
pub const SHA256_HEX_LEN: usize = 64;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the digest of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `sha256:<hex>`, the form carried in `payload_hash`.
    pub fn to_prefixed(&self) -> String {
        format!("{}{}", SHA256_PREFIX, self.to_hex())
    }

    /// Parse a digest from hex, accepting `0x` and `sha256:` prefixes.
    pub fn parse(s: &str) -> Result<Self, HashFormatError> {
        let normalized = validate_hash_format(s)?;
        let bytes =
            hex::decode(&normalized).map_err(|e| HashFormatError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Parse the strict `sha256:<64 lowercase hex>` form.
    pub fn parse_prefixed(s: &str) -> Option<Self> {
        let hex_part = s.strip_prefix(SHA256_PREFIX)?;
        if hex_part.len() != SHA256_HEX_LEN
            || !hex_part
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return None;
        }
        Self::parse(hex_part).ok()
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    Sha256Digest::hash(data)
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256(data).to_hex()
}

/// Stream a file through SHA-256.
///
/// Memory use is constant regardless of file size.
pub fn sha256_file(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of standard base64-encoded content.
pub fn sha256_base64(content: &str) -> Result<String, CoreError> {
    let data = STANDARD
        .decode(content.trim())
        .map_err(|e| CoreError::Decode(format!("failed to decode base64: {}", e)))?;
    Ok(sha256_hex(&data))
}

/// Validate a SHA-256 hex string and return it normalized to lowercase
/// without prefixes.
///
/// `0x` and `sha256:` prefixes are stripped; anything that is not then
/// exactly 64 hex characters is rejected.
pub fn validate_hash_format(hash: &str) -> Result<String, HashFormatError> {
    let hash = hash.strip_prefix("0x").unwrap_or(hash);
    let hash = hash.strip_prefix(SHA256_PREFIX).unwrap_or(hash);

    if hash.len() != SHA256_HEX_LEN {
        return Err(HashFormatError::InvalidLength(hash.len()));
    }
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HashFormatError::InvalidHex(hash.to_string()));
    }
    Ok(hash.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_known_values() {
        assert_eq!(sha256_hex(b""), EMPTY);
        assert_eq!(sha256_hex(b"hello"), HELLO);
        assert_eq!(sha256(b"hello").to_prefixed(), format!("sha256:{}", HELLO));
    }

    #[test]
    fn test_sha256_file_streams() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();
        assert_eq!(sha256_file(file.path()).unwrap(), HELLO);
    }

    #[test]
    fn test_sha256_file_missing() {
        assert!(sha256_file("/definitely/not/here").is_err());
    }

    #[test]
    fn test_sha256_base64() {
        assert_eq!(sha256_base64("aGVsbG8=").unwrap(), HELLO);
        assert!(sha256_base64("***").is_err());
    }

    #[test]
    fn test_validate_hash_format() {
        assert_eq!(validate_hash_format(HELLO).unwrap(), HELLO);
        assert_eq!(
            validate_hash_format(&format!("sha256:{}", HELLO.to_uppercase())).unwrap(),
            HELLO
        );
        assert_eq!(validate_hash_format(&format!("0x{}", HELLO)).unwrap(), HELLO);
        assert_eq!(
            validate_hash_format("abc"),
            Err(HashFormatError::InvalidLength(3))
        );
        let bad = format!("{}z", &HELLO[..63]);
        assert!(matches!(
            validate_hash_format(&bad),
            Err(HashFormatError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_digest_parse_roundtrip() {
        let d = sha256(b"hello");
        assert_eq!(Sha256Digest::parse(&d.to_prefixed()).unwrap(), d);
        assert_eq!(Sha256Digest::parse_prefixed(&d.to_prefixed()), Some(d));
        assert_eq!(Sha256Digest::parse_prefixed(&d.to_hex()), None);
        assert_eq!(
            Sha256Digest::parse_prefixed(&d.to_prefixed().to_uppercase()),
            None
        );
    }
}
