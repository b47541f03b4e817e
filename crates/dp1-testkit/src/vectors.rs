//! Golden test vectors for deterministic verification.
//!
//! Expected outputs were produced by an independent JCS and Ed25519
//! implementation. Every DP-1 implementation must reproduce them byte for
//! byte.

use dp1_core::{
    canonicalize_json, sha256, sha256_hex, Ed25519PublicKey, Ed25519Signature, Keypair, Playlist,
    Role,
};

/// A canonicalization test vector.
#[derive(Debug, Clone)]
pub struct CanonicalVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Arbitrary JSON text.
    pub input: &'static str,
    /// Expected canonical form, trailing newline included.
    pub canonical: &'static str,
    /// Lowercase hex SHA-256 of `canonical`.
    pub sha256: &'static str,
}

/// Get all canonicalization vectors.
pub fn canonical_vectors() -> Vec<CanonicalVector> {
    vec![
        CanonicalVector {
            name: "number formatting",
            input: r#"{"small": 0.25, "int": 42, "neg": -7, "float": 1.5, "big": 1e21, "exp": 1e+2, "zero": 0, "nested": {"z": [3, 2, 1], "a": null}}"#,
            canonical: concat!(
                r#"{"big":1e+21,"exp":100,"float":1.5,"int":42,"neg":-7,"nested":{"a":null,"z":[3,2,1]},"small":0.25,"zero":0}"#,
                "\n"
            ),
            sha256: "ee5f4eacbdd6cb11168365cb08cb54eaabb51cd41da0ff0b135dfa1abd74b263",
        },
        CanonicalVector {
            // U+1F600 sorts before U+E000 by UTF-16 code unit, after it by bytes.
            name: "utf-16 key ordering",
            input: "{\"b\": 1, \"a\": 2, \"\u{e9}\": 3, \"\u{1f600}\": 4, \"\u{e000}\": 5, \"A\": 6, \"aa\": 7}",
            canonical: "{\"A\":6,\"a\":2,\"aa\":7,\"b\":1,\"\u{e9}\":3,\"\u{1f600}\":4,\"\u{e000}\":5}\n",
            sha256: "9df90cf7f2f13f5529548166602dc80c54041aca88f0fb76a4cccb4f058fbe15",
        },
        CanonicalVector {
            name: "string escapes",
            input: r#"{"text": "line\nbreak \"quoted\" tab\t back\\slash \u0001 café", "empty": "", "t": true, "f": false}"#,
            canonical: concat!(
                r#"{"empty":"","f":false,"t":true,"text":"line\nbreak \"quoted\" tab\t back\\slash \u0001 café"}"#,
                "\n"
            ),
            sha256: "55d554489e7f9fd224fb641fe37b774b0ab8b8d2550554401d9c45d49d349c56",
        },
    ]
}

/// A fully specified signed playlist.
#[derive(Debug, Clone)]
pub struct SignedPlaylistVector {
    /// Unsigned playlist JSON, pretty-printed and unsorted.
    pub json: &'static str,
    pub canonical: &'static str,
    /// Digest of `canonical`; also the chain `payload_hash`.
    pub digest: &'static str,
    pub legacy_seed: [u8; 32],
    pub legacy_public_key: &'static str,
    pub legacy_signature: &'static str,
    pub chain_seed: [u8; 32],
    pub chain_public_key: &'static str,
    pub chain_kid: &'static str,
    pub chain_role: Role,
    pub chain_ts: &'static str,
    pub chain_sig: &'static str,
}

impl SignedPlaylistVector {
    pub fn playlist(&self) -> Playlist {
        match Playlist::from_json(self.json.as_bytes()) {
            Ok(playlist) => playlist,
            Err(e) => panic!("golden playlist does not parse: {e}"),
        }
    }
}

/// The signed playlist vector.
pub fn signed_playlist_vector() -> SignedPlaylistVector {
    SignedPlaylistVector {
        json: r##"{
  "dpVersion": "1.0.0",
  "id": "385f79b6-a45f-4c1c-8080-e93a192adccb",
  "slug": "genesis-collection-4821",
  "title": "Genesis Collection",
  "created": "2025-01-01T00:00:00Z",
  "defaults": {
    "display": {
      "scaling": "fit",
      "background": "#000000",
      "margin": "5%"
    },
    "license": "open",
    "duration": 300
  },
  "items": [
    {
      "id": "2f1e9c4a-7b3d-4e8f-9a6b-1c2d3e4f5a6b",
      "title": "Sunrise",
      "source": "https://art.example/sunrise/index.html",
      "duration": 300,
      "license": "open",
      "repro": {
        "engineVersion": {
          "chromium": "123.0.6312.58"
        },
        "seed": "0x84a39ef5",
        "assetsSHA256": [
          "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        ]
      },
      "provenance": {
        "type": "onChain",
        "contract": {
          "chain": "evm",
          "standard": "erc721",
          "address": "0x1234567890abcdef1234567890abcdef12345678",
          "tokenId": "42"
        }
      }
    },
    {
      "id": "5a6b7c8d-9e0f-4a1b-8c2d-3e4f5a6b7c8d",
      "source": "https://art.example/dusk.mp4",
      "duration": 120,
      "license": "token",
      "x-vendor": {
        "keep": true
      }
    }
  ]
}"##,
        canonical: concat!(
            r##"{"created":"2025-01-01T00:00:00Z","defaults":{"display":{"background":"#000000","margin":"5%","scaling":"fit"},"duration":300,"license":"open"},"dpVersion":"1.0.0","id":"385f79b6-a45f-4c1c-8080-e93a192adccb","items":[{"duration":300,"id":"2f1e9c4a-7b3d-4e8f-9a6b-1c2d3e4f5a6b","license":"open","provenance":{"contract":{"address":"0x1234567890abcdef1234567890abcdef12345678","chain":"evm","standard":"erc721","tokenId":"42"},"type":"onChain"},"repro":{"assetsSHA256":["9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"],"engineVersion":{"chromium":"123.0.6312.58"},"seed":"0x84a39ef5"},"source":"https://art.example/sunrise/index.html","title":"Sunrise"},{"duration":120,"id":"5a6b7c8d-9e0f-4a1b-8c2d-3e4f5a6b7c8d","license":"token","source":"https://art.example/dusk.mp4","x-vendor":{"keep":true}}],"slug":"genesis-collection-4821","title":"Genesis Collection"}"##,
            "\n"
        ),
        digest: "1442fa294b4370f1a82b1cdac7e11ae28c55d632231c2716c68bab5216cd7b96",
        legacy_seed: [0x42; 32],
        legacy_public_key: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
        legacy_signature: "ed25519:7f11760775515cd9779c8e5e801352b9147c46f16d62415466f096874c06ef0294ee01641cb0c7a0b80ca433110ed61bfbfc1f80939c8dfc975e40498ae3aa01",
        chain_seed: [0x43; 32],
        chain_public_key: "22fc297792f0b6ffc0bfcfdb7edb0c0aa14e025a365ec0e342e86e3829cb74b6",
        chain_kid: "did:key:curator",
        chain_role: Role::Curator,
        chain_ts: "2025-01-01T00:00:00Z",
        chain_sig: "M6k2BvfnL3dbY-MQc-R6KEOhH6yyXe12TRwX2ThTw7jWHd3yPFUpu4D_0rQukBxoNM1tp6EBQYELz-rYmlbFAg",
    }
}

/// Check every vector against this implementation.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in canonical_vectors() {
        let bytes = canonicalize_json(vector.input.as_bytes())
            .map_err(|e| format!("{}: {}", vector.name, e))?;
        if bytes != vector.canonical.as_bytes() {
            return Err(format!(
                "{}: canonical mismatch: {}",
                vector.name,
                String::from_utf8_lossy(&bytes)
            ));
        }
        let digest = sha256_hex(&bytes);
        if digest != vector.sha256 {
            return Err(format!("{}: digest mismatch: {}", vector.name, digest));
        }
    }

    let vector = signed_playlist_vector();
    let playlist = Playlist::from_json(vector.json.as_bytes()).map_err(|e| e.to_string())?;
    let canonical = playlist.canonical_bytes().map_err(|e| e.to_string())?;
    if canonical != vector.canonical.as_bytes() {
        return Err("signed playlist: canonical mismatch".into());
    }
    let digest = sha256(&canonical);
    if digest.to_hex() != vector.digest {
        return Err(format!("signed playlist: digest mismatch: {}", digest.to_hex()));
    }

    let legacy = Keypair::from_seed(&vector.legacy_seed);
    if legacy.public_key().to_hex() != vector.legacy_public_key {
        return Err("legacy public key mismatch".into());
    }
    if legacy.sign(digest.as_bytes()).to_legacy() != vector.legacy_signature {
        return Err("legacy signature mismatch".into());
    }

    let chain_key = Ed25519PublicKey::from_hex(vector.chain_public_key).map_err(|e| e.to_string())?;
    let sig = Ed25519Signature::from_base64url(vector.chain_sig).map_err(|e| e.to_string())?;
    chain_key
        .verify(digest.as_bytes(), &sig)
        .map_err(|e| format!("chain signature: {e}"))?;

    Ok(())
}
