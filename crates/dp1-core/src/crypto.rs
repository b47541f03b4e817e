//! Ed25519 key and signature types used by DP-1 signing.
//!
//! Two textual encodings are in play: the legacy playlist field carries
//! `ed25519:<128 hex>`, while signature records carry base64url without
//! padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SigError;

/// Prefix of the legacy `signature` field.
pub const LEGACY_SIG_PREFIX: &str = "ed25519:";

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), SigError> {
        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| SigError::MalformedSignature(format!("invalid public key: {}", e)))?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| SigError::SigInvalid)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode as base64url without padding, the signature record form.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Decode the signature record form. Padding is rejected.
    pub fn from_base64url(s: &str) -> Result<Self, SigError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| SigError::MalformedSignature(format!("invalid base64url: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Encode as the legacy `ed25519:<hex>` field value.
    pub fn to_legacy(&self) -> String {
        format!("{}{}", LEGACY_SIG_PREFIX, self.to_hex())
    }

    /// Decode the legacy `ed25519:<hex>` field value.
    pub fn from_legacy(s: &str) -> Result<Self, SigError> {
        let hex_part = s.strip_prefix(LEGACY_SIG_PREFIX).ok_or_else(|| {
            SigError::MalformedSignature(format!("expected {} prefix", LEGACY_SIG_PREFIX))
        })?;
        let bytes = hex::decode(hex_part)
            .map_err(|e| SigError::MalformedSignature(format!("invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, SigError> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            SigError::MalformedSignature(format!(
                "expected 64 signature bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 64]> for Ed25519Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

/// A keypair for signing playlists.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex-encoded 32-byte seed, as found in server configuration.
    pub fn from_seed_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"hello world");

        keypair
            .public_key()
            .verify(b"hello world", &signature)
            .expect("valid signature should verify");

        assert!(matches!(
            keypair.public_key().verify(b"hello worlD", &signature),
            Err(SigError::SigInvalid)
        ));
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let kp1 = Keypair::from_seed(&[0x42u8; 32]);
        let kp2 = Keypair::from_seed_hex(&"42".repeat(32)).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.seed(), [0x42u8; 32]);
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = Keypair::generate().public_key();
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert!(Ed25519PublicKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_signature_encodings() {
        let sig = Keypair::from_seed(&[7u8; 32]).sign(b"msg");

        let b64 = sig.to_base64url();
        assert!(!b64.contains('='));
        assert_eq!(b64.len(), 86);
        assert_eq!(Ed25519Signature::from_base64url(&b64).unwrap(), sig);

        let legacy = sig.to_legacy();
        assert!(legacy.starts_with("ed25519:"));
        assert_eq!(legacy.len(), 8 + 128);
        assert_eq!(Ed25519Signature::from_legacy(&legacy).unwrap(), sig);
    }

    #[test]
    fn test_malformed_signatures() {
        assert!(matches!(
            Ed25519Signature::from_legacy("rsa:00"),
            Err(SigError::MalformedSignature(_))
        ));
        assert!(matches!(
            Ed25519Signature::from_legacy("ed25519:abcd"),
            Err(SigError::MalformedSignature(_))
        ));
        let padded = format!("{}==", "A".repeat(84));
        assert!(Ed25519Signature::from_base64url(&padded).is_err());
    }
}
