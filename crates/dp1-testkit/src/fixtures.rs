//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;

use chrono::{DateTime, Utc};

use dp1_core::{
    sign_legacy, sign_record, Keypair, Playlist, PlaylistGroup, PlaylistItem, Repro, Role,
    TrustPolicy, TrustStore,
};

pub const CURATOR_KID: &str = "did:key:curator";
pub const FEED_KID: &str = "did:key:feed";
pub const AGENT_KID: &str = "did:key:agent";

/// Deterministic signers for each role plus a matching trust store.
pub struct TestFixture {
    pub curator: Keypair,
    pub feed: Keypair,
    pub agent: Keypair,
    pub legacy: Keypair,
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a fixture with fixed seeds.
    pub fn new() -> Self {
        Self {
            curator: Keypair::from_seed(&[0x42; 32]),
            feed: Keypair::from_seed(&[0x43; 32]),
            agent: Keypair::from_seed(&[0x44; 32]),
            legacy: Keypair::from_seed(&[0x45; 32]),
        }
    }

    /// Trust store resolving the fixture's kids.
    pub fn trust_store(&self) -> TrustStore {
        TrustStore::new()
            .with_ed25519(CURATOR_KID, self.curator.public_key())
            .with_ed25519(FEED_KID, self.feed.public_key())
            .with_ed25519(AGENT_KID, self.agent.public_key())
    }

    /// Default policy that also trusts the fixture's legacy key.
    pub fn policy(&self) -> TrustPolicy {
        TrustPolicy::default().with_legacy_key(self.legacy.public_key())
    }

    pub fn signer(&self, role: Role) -> (&Keypair, &'static str) {
        match role {
            Role::Feed => (&self.feed, FEED_KID),
            Role::Agent => (&self.agent, AGENT_KID),
            _ => (&self.curator, CURATOR_KID),
        }
    }

    /// Append a chain record for `role`, timestamped now.
    pub fn sign(&self, playlist: &mut Playlist, role: Role) {
        self.sign_at(playlist, role, Utc::now());
    }

    pub fn sign_at(&self, playlist: &mut Playlist, role: Role, ts: DateTime<Utc>) {
        let (keypair, kid) = self.signer(role);
        let record = sign_record(playlist, keypair, kid, role, ts).unwrap();
        playlist.signatures.get_or_insert_with(Vec::new).push(record);
    }

    /// Set the legacy signature with the fixture's legacy key.
    pub fn sign_legacy(&self, playlist: &mut Playlist) {
        playlist.signature = Some(sign_legacy(playlist, &self.legacy).unwrap());
    }

    /// A sample playlist signed by each role in `roles`.
    pub fn signed_playlist(&self, title: &str, roles: &[Role]) -> Playlist {
        let mut playlist = sample_playlist(title);
        for role in roles {
            self.sign(&mut playlist, *role);
        }
        playlist
    }
}

/// An item with a fixed source and a 60 second duration.
pub fn sample_item(source: &str) -> PlaylistItem {
    PlaylistItem::new(source, 60)
}

/// A valid, unsigned two-item playlist.
pub fn sample_playlist(title: &str) -> Playlist {
    Playlist::new(
        title,
        vec![
            sample_item("https://art.example/works/1"),
            sample_item("https://art.example/works/2"),
        ],
    )
}

/// A playlist whose single item declares `hashes` as its capsule manifest.
pub fn playlist_with_assets(title: &str, hashes: Vec<String>) -> Playlist {
    let mut item = sample_item("https://art.example/capsule");
    item.repro = Some(Repro {
        assets_sha256: Some(hashes),
        ..Repro::default()
    });
    Playlist::new(title, vec![item])
}

/// A group referencing `urls`.
pub fn sample_group(title: &str, urls: &[&str]) -> PlaylistGroup {
    PlaylistGroup::new(
        title,
        "Test Curator",
        urls.iter().map(|u| u.to_string()).collect(),
    )
}

/// A temporary directory holding `files` at the given relative paths.
pub fn capsule_dir(files: &[(&str, &[u8])]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        write_file(dir.path(), name, content);
    }
    dir
}

fn write_file(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
