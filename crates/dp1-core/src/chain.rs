//! Playlist signature verification: legacy single signatures and
//! role-based signature chains.
//!
//! Both modes sign the SHA-256 digest of the canonical form with the
//! signature field(s) removed, so the field being verified is never part of
//! what it covers. Legacy signatures strip only `signature`; chain records
//! strip `signature` and `signatures` and additionally pin the digest in
//! `payload_hash`.
//!
//! Key material comes from an injected [`KeyResolver`]. Whether a chain is
//! trusted is decided by a [`TrustPolicy`] over the set of roles whose
//! signatures verified.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use crate::canonical::fields;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CanonicalizationError, SigError};
use crate::hash::{sha256, Sha256Digest};
use crate::playlist::{signable_bytes, Playlist, SignatureRecord};
use crate::types::{Role, SignatureAlg};

/// Verification key material returned by a [`KeyResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolvedKey {
    Ed25519(Ed25519PublicKey),
}

/// Resolves a `kid` to verification key material.
///
/// Implementations may consult DID documents, a JWKS endpoint, or a local
/// trust store. Failures should be reported as
/// [`SigError::KeyResolutionFailed`].
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, kid: &str, alg: &SignatureAlg) -> Result<ResolvedKey, SigError>;
}

#[async_trait]
impl<T: KeyResolver + ?Sized> KeyResolver for std::sync::Arc<T> {
    async fn resolve(&self, kid: &str, alg: &SignatureAlg) -> Result<ResolvedKey, SigError> {
        (**self).resolve(kid, alg).await
    }
}

/// A local trust store mapping key identifiers to keys.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    keys: HashMap<String, ResolvedKey>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ed25519(mut self, kid: impl Into<String>, key: Ed25519PublicKey) -> Self {
        self.insert_ed25519(kid, key);
        self
    }

    pub fn insert_ed25519(&mut self, kid: impl Into<String>, key: Ed25519PublicKey) {
        self.keys.insert(kid.into(), ResolvedKey::Ed25519(key));
    }

    pub fn remove(&mut self, kid: &str) -> Option<ResolvedKey> {
        self.keys.remove(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyResolver for TrustStore {
    async fn resolve(&self, kid: &str, _alg: &SignatureAlg) -> Result<ResolvedKey, SigError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| SigError::KeyResolutionFailed {
                kid: kid.to_string(),
                reason: "unknown key identifier".into(),
            })
    }
}

/// Which valid signatures a playlist needs to be trusted.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    /// At least one of these roles must have a valid signature.
    /// An empty set imposes no requirement.
    pub required_any: BTreeSet<Role>,
    /// Every one of these roles must have a valid signature.
    pub required_all: BTreeSet<Role>,
    /// When any record declares the `agent` role, a valid `agent`
    /// signature becomes mandatory.
    pub require_declared_agent: bool,
    /// Report failing records instead of failing the whole chain; only the
    /// role requirements then decide.
    pub allow_partial: bool,
    /// Allowed distance between a record's `ts` and now. Exceeding it is a
    /// warning only.
    pub max_clock_skew: Duration,
    /// Trusted key for the legacy `signature` field.
    pub legacy_key: Option<Ed25519PublicKey>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            required_any: [Role::Curator, Role::Feed].into_iter().collect(),
            required_all: BTreeSet::new(),
            require_declared_agent: true,
            allow_partial: false,
            max_clock_skew: Duration::from_secs(5 * 60),
            legacy_key: None,
        }
    }
}

impl TrustPolicy {
    /// The default policy, failing on any bad record.
    pub fn strict() -> Self {
        Self::default()
    }

    /// The default role requirements, tolerating individual bad records.
    pub fn partial() -> Self {
        Self {
            allow_partial: true,
            ..Self::default()
        }
    }

    pub fn with_legacy_key(mut self, key: Ed25519PublicKey) -> Self {
        self.legacy_key = Some(key);
        self
    }

    pub fn require_all(mut self, role: Role) -> Self {
        self.required_all.insert(role);
        self
    }

    /// Roles required by this policy that are absent from `valid`.
    fn missing_roles(&self, valid: &BTreeSet<Role>, declared_agent: bool) -> Vec<Role> {
        let mut missing = BTreeSet::new();
        if !self.required_any.is_empty() && self.required_any.is_disjoint(valid) {
            missing.extend(self.required_any.iter().copied());
        }
        missing.extend(self.required_all.difference(valid).copied());
        if self.require_declared_agent && declared_agent && !valid.contains(&Role::Agent) {
            missing.insert(Role::Agent);
        }
        missing.into_iter().collect()
    }
}

/// Outcome of checking one signature record.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureOutcome {
    pub index: usize,
    pub kid: String,
    pub role: Role,
    pub alg: SignatureAlg,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a successful verification.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifiedRoles {
    /// Roles with at least one valid signature.
    pub roles: BTreeSet<Role>,
    /// One entry per signature record, in record order.
    pub signatures: Vec<SignatureOutcome>,
    /// Whether a legacy signature was checked and verified.
    pub legacy_verified: bool,
    /// Non-fatal findings such as clock skew or a failing legacy signature.
    pub warnings: Vec<String>,
}

impl VerifiedRoles {
    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Whether every signature record verified.
    pub fn all_valid(&self) -> bool {
        self.signatures.iter().all(|s| s.valid)
    }
}

/// The signature fields of a document and the digests they cover.
///
/// Built either from a typed [`Playlist`] or from the bytes as received.
/// The latter hashes exactly what the signer saw, including `null`
/// members that the typed model drops on re-serialization.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    id: String,
    signature: Option<String>,
    signatures: Vec<SignatureRecord>,
    payload: Sha256Digest,
    legacy: Sha256Digest,
}

impl SignedPayload {
    pub fn from_playlist(playlist: &Playlist) -> Result<Self, SigError> {
        Ok(Self {
            id: playlist.id.clone(),
            signature: playlist.signature.clone().filter(|s| !s.is_empty()),
            signatures: playlist.signatures.clone().unwrap_or_default(),
            payload: playlist.payload_hash()?,
            legacy: sha256(&playlist.legacy_signable_bytes()?),
        })
    }

    /// Read the signature fields from a raw JSON document and hash its
    /// stripped canonical form.
    pub fn from_json(raw: &[u8]) -> Result<Self, SigError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| CanonicalizationError::InvalidJson(e.to_string()))?;

        let signatures = match value.get(fields::SIGNATURES) {
            None | Some(Value::Null) => Vec::new(),
            Some(records) => serde_json::from_value(records.clone())
                .map_err(|e| SigError::MalformedSignature(format!("signatures: {e}")))?,
        };
        let signature = match value.get(fields::SIGNATURE) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()).filter(|s| !s.is_empty()),
            Some(_) => {
                return Err(SigError::MalformedSignature(
                    "signature is not a string".into(),
                ))
            }
        };

        Ok(Self {
            id: value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            signature,
            signatures,
            payload: sha256(&signable_bytes(&value, &[fields::SIGNATURE, fields::SIGNATURES])?),
            legacy: sha256(&signable_bytes(&value, &[fields::SIGNATURE])?),
        })
    }

    /// Digest covered by `payload_hash` and every chain record.
    pub fn payload_hash(&self) -> &Sha256Digest {
        &self.payload
    }

    pub fn has_chain(&self) -> bool {
        !self.signatures.is_empty()
    }

    pub fn has_legacy(&self) -> bool {
        self.signature.is_some()
    }
}

/// Verify the legacy `signature` field against a trusted key.
pub fn verify_legacy(playlist: &Playlist, key: &Ed25519PublicKey) -> Result<(), SigError> {
    match playlist.signature.as_deref() {
        Some(s) if !s.is_empty() => {
            let digest = sha256(&playlist.legacy_signable_bytes()?);
            verify_legacy_digest(s, &digest, key)
        }
        _ => Err(SigError::Unsigned),
    }
}

fn verify_legacy_digest(
    signature: &str,
    digest: &Sha256Digest,
    key: &Ed25519PublicKey,
) -> Result<(), SigError> {
    let signature = Ed25519Signature::from_legacy(signature)?;
    key.verify(digest.as_bytes(), &signature)
}

/// Verify the `signatures` chain against the current time.
pub async fn verify_chain(
    playlist: &Playlist,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
) -> Result<VerifiedRoles, SigError> {
    verify_chain_at(playlist, resolver, policy, Utc::now()).await
}

/// Verify the `signatures` chain, judging clock skew relative to `now`.
pub async fn verify_chain_at(
    playlist: &Playlist,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
    now: DateTime<Utc>,
) -> Result<VerifiedRoles, SigError> {
    if !playlist.signatures.as_ref().is_some_and(|s| !s.is_empty()) {
        return Err(SigError::Unsigned);
    }
    let payload = SignedPayload::from_playlist(playlist)?;
    verify_records_at(&payload, resolver, policy, now).await
}

async fn verify_records_at(
    payload: &SignedPayload,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
    now: DateTime<Utc>,
) -> Result<VerifiedRoles, SigError> {
    let records = &payload.signatures;
    if records.is_empty() {
        return Err(SigError::Unsigned);
    }

    let mut verified = VerifiedRoles::default();

    for (index, record) in records.iter().enumerate() {
        let mut outcome = SignatureOutcome {
            index,
            kid: record.kid.clone(),
            role: record.role,
            alg: record.alg.clone(),
            valid: false,
            error: None,
            warnings: Vec::new(),
        };

        if let Some(warning) = skew_warning(record, now, policy.max_clock_skew) {
            warn!(kid = %record.kid, %warning, "signature timestamp outside tolerance");
            outcome.warnings.push(warning.clone());
            verified.warnings.push(warning);
        }

        match verify_record(record, &payload.payload, resolver).await {
            Ok(()) => {
                debug!(index, kid = %record.kid, role = %record.role, "signature verified");
                outcome.valid = true;
                verified.roles.insert(record.role);
            }
            Err(e) if policy.allow_partial => {
                warn!(index, kid = %record.kid, error = %e, "signature failed under partial trust");
                outcome.error = Some(e.to_string());
            }
            Err(e) => {
                debug!(index, kid = %record.kid, error = %e, "signature failed");
                return Err(e);
            }
        }

        verified.signatures.push(outcome);
    }

    let declared_agent = records.iter().any(|r| r.role == Role::Agent);
    let missing = policy.missing_roles(&verified.roles, declared_agent);
    if !missing.is_empty() {
        return Err(SigError::InsufficientRoles { missing });
    }

    Ok(verified)
}

/// Check one record: payload hash, key resolution, then the signature.
async fn verify_record(
    record: &SignatureRecord,
    payload: &Sha256Digest,
    resolver: &dyn KeyResolver,
) -> Result<(), SigError> {
    let actual = payload.to_prefixed();
    if record.payload_hash != actual {
        return Err(SigError::PayloadHashMismatch {
            expected: record.payload_hash.clone(),
            actual,
        });
    }

    let key = resolver.resolve(&record.kid, &record.alg).await?;

    match (&record.alg, key) {
        (SignatureAlg::Ed25519, ResolvedKey::Ed25519(pk)) => {
            let signature = Ed25519Signature::from_base64url(&record.sig)?;
            pk.verify(payload.as_bytes(), &signature)
        }
        (alg, _) => Err(SigError::UnsupportedAlgorithm(alg.to_string())),
    }
}

fn skew_warning(record: &SignatureRecord, now: DateTime<Utc>, max: Duration) -> Option<String> {
    let ts = match DateTime::parse_from_rfc3339(&record.ts) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => return Some(format!("unparseable signature timestamp {:?}", record.ts)),
    };
    let skew = (now - ts).abs().to_std().unwrap_or(Duration::MAX);
    (skew > max).then(|| {
        format!(
            "signature by {} is {}s away from now (tolerance {}s)",
            record.kid,
            skew.as_secs(),
            max.as_secs()
        )
    })
}

/// Verify whichever signature representation governs the playlist.
///
/// `signatures` takes precedence. A legacy `signature` alongside it is
/// checked only when the policy names a legacy key, and its failure is
/// recorded as a warning. Without `signatures`, the legacy field is
/// verified against the policy's legacy key.
pub async fn verify_playlist(
    playlist: &Playlist,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
) -> Result<VerifiedRoles, SigError> {
    verify_playlist_at(playlist, resolver, policy, Utc::now()).await
}

/// [`verify_playlist`] with clock skew judged relative to `now`.
pub async fn verify_playlist_at(
    playlist: &Playlist,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
    now: DateTime<Utc>,
) -> Result<VerifiedRoles, SigError> {
    let payload = SignedPayload::from_playlist(playlist)?;
    verify_payload_at(&payload, resolver, policy, now).await
}

/// [`verify_playlist`] over a document exactly as received.
pub async fn verify_playlist_json(
    raw: &[u8],
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
) -> Result<VerifiedRoles, SigError> {
    let payload = SignedPayload::from_json(raw)?;
    verify_payload_at(&payload, resolver, policy, Utc::now()).await
}

/// Dispatch between the chain and the legacy field for a prepared payload.
pub async fn verify_payload_at(
    payload: &SignedPayload,
    resolver: &dyn KeyResolver,
    policy: &TrustPolicy,
    now: DateTime<Utc>,
) -> Result<VerifiedRoles, SigError> {
    if payload.has_chain() {
        let mut verified = verify_records_at(payload, resolver, policy, now).await?;
        if let (Some(signature), Some(key)) = (payload.signature.as_deref(), policy.legacy_key.as_ref()) {
            match verify_legacy_digest(signature, &payload.legacy, key) {
                Ok(()) => verified.legacy_verified = true,
                Err(e) => {
                    warn!(playlist = %payload.id, error = %e, "legacy signature failed alongside chain");
                    verified
                        .warnings
                        .push(format!("legacy signature did not verify: {}", e));
                }
            }
        }
        return Ok(verified);
    }

    if let Some(signature) = payload.signature.as_deref() {
        let key = policy
            .legacy_key
            .as_ref()
            .ok_or_else(|| SigError::KeyResolutionFailed {
                kid: "legacy".into(),
                reason: "no trusted legacy key configured".into(),
            })?;
        verify_legacy_digest(signature, &payload.legacy, key)?;
        return Ok(VerifiedRoles {
            legacy_verified: true,
            ..VerifiedRoles::default()
        });
    }

    Err(SigError::Unsigned)
}

/// Produce a legacy `ed25519:<hex>` signature for the playlist.
///
/// The legacy field covers `signatures`, so add chain records first.
pub fn sign_legacy(playlist: &Playlist, keypair: &Keypair) -> Result<String, SigError> {
    let digest = sha256(&playlist.legacy_signable_bytes()?);
    Ok(keypair.sign(digest.as_bytes()).to_legacy())
}

/// Produce an Ed25519 signature record for the playlist.
pub fn sign_record(
    playlist: &Playlist,
    keypair: &Keypair,
    kid: impl Into<String>,
    role: Role,
    ts: DateTime<Utc>,
) -> Result<SignatureRecord, SigError> {
    let payload = playlist.payload_hash()?;
    Ok(SignatureRecord {
        alg: SignatureAlg::Ed25519,
        kid: kid.into(),
        ts: ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        payload_hash: payload.to_prefixed(),
        role,
        sig: keypair.sign(payload.as_bytes()).to_base64url(),
    })
}

/// A resolver and policy bundled into one verifier value.
///
/// Build as many as needed, e.g. one strict and one partial-trust verifier
/// sharing a resolver behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SignatureVerifier<R> {
    resolver: R,
    policy: TrustPolicy,
}

impl<R: KeyResolver> SignatureVerifier<R> {
    pub fn new(resolver: R, policy: TrustPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub async fn verify(&self, playlist: &Playlist) -> Result<VerifiedRoles, SigError> {
        verify_playlist(playlist, &self.resolver, &self.policy).await
    }

    pub async fn verify_chain(&self, playlist: &Playlist) -> Result<VerifiedRoles, SigError> {
        verify_chain(playlist, &self.resolver, &self.policy).await
    }

    /// Verify a document as received, before any typed decoding.
    pub async fn verify_json(&self, raw: &[u8]) -> Result<VerifiedRoles, SigError> {
        verify_playlist_json(raw, &self.resolver, &self.policy).await
    }
}
