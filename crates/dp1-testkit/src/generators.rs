//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use dp1_core::{Keypair, License, Playlist, PlaylistItem, Role};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a signer role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Curator),
        Just(Role::Feed),
        Just(Role::Agent),
        Just(Role::Institution),
        Just(Role::Licensor),
    ]
}

/// Generate a license.
pub fn license() -> impl Strategy<Value = License> {
    prop_oneof![
        Just(License::Open),
        Just(License::Token),
        Just(License::Subscription),
    ]
}

/// Generate a lowercase 64 character hex hash.
pub fn hash_hex() -> impl Strategy<Value = String> {
    "[0-9a-f]{64}"
}

/// Generate an object key, including characters outside the BMP.
pub fn json_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_]{0,8}",
        "\\PC{0,4}",
        Just("\u{1f600}".to_string()),
        Just("\u{e000}".to_string()),
    ]
}

/// Generate an arbitrary JSON value without floats.
///
/// Integers stay inside the range every JSON runtime represents exactly.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-(1i64 << 53)..=(1i64 << 53)).prop_map(Value::from),
        "\\PC{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((json_key(), inner), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Parameters for a generated playlist.
#[derive(Debug, Clone)]
pub struct PlaylistParams {
    pub title: String,
    pub items: Vec<(u64, License)>,
    pub assets: Vec<String>,
}

impl Arbitrary for PlaylistParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            "[A-Za-z0-9][A-Za-z0-9 ]{0,39}",
            prop::collection::vec((1u64..=86_400, license()), 1..5),
            prop::collection::vec(hash_hex(), 0..4),
        )
            .prop_map(|(title, items, assets)| PlaylistParams {
                title,
                items,
                assets,
            })
            .boxed()
    }
}

/// Build a valid playlist from parameters. The asset hashes go on the
/// first item.
pub fn playlist_from_params(params: &PlaylistParams) -> Playlist {
    let items = params
        .items
        .iter()
        .enumerate()
        .map(|(i, (duration, license))| {
            let mut item = PlaylistItem::new(format!("https://art.example/works/{i}"), *duration);
            item.license = Some(*license);
            item
        })
        .collect();
    let mut playlist = Playlist::new(params.title.clone(), items);
    if !params.assets.is_empty() {
        if let Some(first) = playlist.items.first_mut() {
            first.repro = Some(dp1_core::Repro {
                assets_sha256: Some(params.assets.clone()),
                ..Default::default()
            });
        }
    }
    playlist
}

/// Generate a valid, unsigned playlist.
pub fn playlist() -> impl Strategy<Value = Playlist> {
    any::<PlaylistParams>().prop_map(|params| playlist_from_params(&params))
}
