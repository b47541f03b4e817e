//! Golden vectors for cross-implementation verification.
//!
//! Every DP-1 implementation must produce identical:
//! - canonical bytes
//! - SHA-256 digests and `payload_hash`
//! - legacy signatures (deterministic Ed25519)
//! - chain record signatures

use chrono::{DateTime, Utc};

use dp1::core::{
    canonicalize_json, sha256_hex, sign_legacy, sign_record, verify_chain_at, verify_legacy,
    Ed25519PublicKey, Keypair, SigError, TrustPolicy, TrustStore,
};
use dp1_testkit::vectors::{canonical_vectors, signed_playlist_vector, verify_all_vectors};

#[test]
fn canonical_vectors_match() {
    for vector in canonical_vectors() {
        let bytes = canonicalize_json(vector.input.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            vector.canonical,
            "canonical form of {}",
            vector.name
        );
        assert_eq!(sha256_hex(&bytes), vector.sha256, "digest of {}", vector.name);
    }
}

#[test]
fn canonical_output_is_a_fixed_point() {
    for vector in canonical_vectors() {
        let again = canonicalize_json(vector.canonical.as_bytes()).unwrap();
        assert_eq!(again, vector.canonical.as_bytes(), "{}", vector.name);
    }
}

#[test]
fn playlist_round_trip_preserves_canonical_form() {
    let vector = signed_playlist_vector();
    let playlist = vector.playlist();
    assert_eq!(playlist.canonical_bytes().unwrap(), vector.canonical.as_bytes());
    assert_eq!(playlist.payload_hash().unwrap().to_hex(), vector.digest);
    assert_eq!(
        playlist.items[1].extra.get("x-vendor"),
        Some(&serde_json::json!({"keep": true}))
    );
}

#[test]
fn legacy_signature_matches() {
    let vector = signed_playlist_vector();
    let mut playlist = vector.playlist();
    let keypair = Keypair::from_seed(&vector.legacy_seed);
    assert_eq!(keypair.public_key().to_hex(), vector.legacy_public_key);

    let signature = sign_legacy(&playlist, &keypair).unwrap();
    assert_eq!(signature, vector.legacy_signature);

    playlist.signature = Some(signature);
    let key = Ed25519PublicKey::from_hex(vector.legacy_public_key).unwrap();
    verify_legacy(&playlist, &key).unwrap();

    // The signature field itself is excluded from what it covers.
    assert_eq!(playlist.legacy_signable_bytes().unwrap(), vector.canonical.as_bytes());
}

#[tokio::test]
async fn chain_record_matches() {
    let vector = signed_playlist_vector();
    let mut playlist = vector.playlist();
    let keypair = Keypair::from_seed(&vector.chain_seed);
    let ts: DateTime<Utc> = vector.chain_ts.parse().unwrap();

    let record = sign_record(&playlist, &keypair, vector.chain_kid, vector.chain_role, ts).unwrap();
    assert_eq!(record.payload_hash, format!("sha256:{}", vector.digest));
    assert_eq!(record.sig, vector.chain_sig);
    assert_eq!(record.ts, vector.chain_ts);

    playlist.signatures = Some(vec![record]);
    let trust = TrustStore::new().with_ed25519(
        vector.chain_kid,
        Ed25519PublicKey::from_hex(vector.chain_public_key).unwrap(),
    );
    let verified = verify_chain_at(&playlist, &trust, &TrustPolicy::default(), ts)
        .await
        .unwrap();
    assert!(verified.has(vector.chain_role));

    playlist.title = Some("Tampered".into());
    assert!(matches!(
        verify_chain_at(&playlist, &trust, &TrustPolicy::default(), ts).await,
        Err(SigError::PayloadHashMismatch { .. })
    ));
}

#[test]
fn testkit_vectors_verify() {
    verify_all_vectors().unwrap();
}
