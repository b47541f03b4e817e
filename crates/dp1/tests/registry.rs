//! End-to-end registry scenarios over the in-memory store and fetcher.

use std::sync::Arc;

use dp1::capsule::{CapsuleVerifier, ScanConfig, VerificationTarget};
use dp1::core::hash::sha256_hex;
use dp1::fetch::memory::MemoryFetcher;
use dp1::store::{KvStoreExt, MemoryKv, SqliteKv};
use dp1::{
    ListQuery, Playlist, Registry, RegistryConfig, RegistryError, Role, SelfHostedOrigin,
    ServerSigner,
};
use dp1_testkit::fixtures::{playlist_with_assets, sample_group, sample_playlist};
use dp1_testkit::{capsule_dir, init_test_tracing, TestFixture};

const REGISTRY: &str = "https://registry.example/api/v1/playlists";
const FEED: &str = "https://feed.example/api/v1/playlists";

type TestRegistry = Registry<Arc<MemoryKv>, Arc<MemoryFetcher>>;

struct Harness {
    registry: TestRegistry,
    store: Arc<MemoryKv>,
    fetcher: Arc<MemoryFetcher>,
}

fn harness() -> Harness {
    init_test_tracing();
    let store = Arc::new(MemoryKv::new());
    let fetcher = Arc::new(MemoryFetcher::new());
    let config =
        RegistryConfig::default().with_self_hosted(SelfHostedOrigin::new("registry.example"));
    let registry = Registry::new(store.clone(), fetcher.clone(), config).unwrap();
    Harness {
        registry,
        store,
        fetcher,
    }
}

fn publish(fetcher: &MemoryFetcher, url: &str, playlist: &Playlist) {
    fetcher.insert_json(url, &serde_json::to_value(playlist).unwrap());
}

async fn member_ids(registry: &TestRegistry, group: &str) -> Vec<String> {
    let mut ids: Vec<String> = registry
        .list_playlists_in_group(group, &ListQuery::default())
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|p| p.id)
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn self_hosted_references_are_never_fetched() {
    let h = harness();
    let local = h.registry.create_playlist(sample_playlist("Local")).await.unwrap();
    let slug = local.slug.clone().unwrap();

    let external = sample_playlist("External");
    let external_url = format!("{FEED}/{}", external.id);
    publish(&h.fetcher, &external_url, &external);

    let by_slug = format!("{REGISTRY}/{slug}");
    let by_id = format!("https://REGISTRY.example/api/v1/playlists/{}/", local.id);
    let group = h
        .registry
        .create_playlist_group(sample_group("Mixed", &[by_slug.as_str(), by_id.as_str(), external_url.as_str()]))
        .await
        .unwrap();

    assert_eq!(h.fetcher.calls(&by_slug), 0);
    assert_eq!(h.fetcher.calls(&by_id), 0);
    assert_eq!(h.fetcher.calls(&external_url), 1);
    assert_eq!(h.fetcher.total_calls(), 1);

    // Both local URLs name the same playlist: one membership entry.
    let mut expected = vec![local.id.clone(), external.id.clone()];
    expected.sort();
    assert_eq!(member_ids(&h.registry, &group.id).await, expected);

    // The external playlist was imported.
    let imported = h.registry.get_playlist(&external.id).await.unwrap().unwrap();
    assert_eq!(imported.title.as_deref(), Some("External"));
}

#[tokio::test]
async fn missing_self_hosted_playlist_is_unresolvable() {
    let h = harness();
    let url = format!("{REGISTRY}/no-such-playlist-0000");
    let err = h
        .registry
        .create_playlist_group(sample_group("Broken", &[url.as_str()]))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ReferenceUnresolvable { .. }));
    assert_eq!(h.fetcher.total_calls(), 0);
}

#[tokio::test]
async fn failed_reference_writes_nothing() {
    let h = harness();
    let good = sample_playlist("Good");
    let good_url = format!("{FEED}/{}", good.id);
    publish(&h.fetcher, &good_url, &good);
    let bad_url = format!("{FEED}/gone");
    h.fetcher.insert_status(&bad_url, 500);

    let group = sample_group("All Or Nothing", &[good_url.as_str(), bad_url.as_str()]);
    let err = h.registry.save_playlist_group(&group).await.unwrap_err();
    match err {
        RegistryError::ReferenceUnresolvable { url, .. } => assert_eq!(url, bad_url),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(h.registry.get_playlist_group(&group.id).await.unwrap().is_none());
    assert!(h.registry.get_playlist(&good.id).await.unwrap().is_none());
    assert!(h.store.list_all("").await.unwrap().is_empty());
}

#[tokio::test]
async fn update_prunes_stale_memberships() {
    let h = harness();
    let first = h.registry.create_playlist(sample_playlist("First")).await.unwrap();
    let second = h.registry.create_playlist(sample_playlist("Second")).await.unwrap();
    let first_url = format!("{REGISTRY}/{}", first.id);
    let second_url = format!("{REGISTRY}/{}", second.id);

    let group = h
        .registry
        .create_playlist_group(sample_group("Evolving", &[first_url.as_str(), second_url.as_str()]))
        .await
        .unwrap();
    assert_eq!(member_ids(&h.registry, &group.id).await.len(), 2);

    let old_slug = group.slug.clone().unwrap();
    let updated = h
        .registry
        .update_playlist_group(&old_slug, sample_group("Evolved", &[second_url.as_str()]))
        .await
        .unwrap();
    assert_eq!(updated.id, group.id);
    assert_eq!(updated.created, group.created);
    assert_eq!(member_ids(&h.registry, &group.id).await, vec![second.id.clone()]);

    // The old slug no longer routes anywhere.
    assert!(h.registry.get_playlist_group(&old_slug).await.unwrap().is_none());
    let new_slug = updated.slug.unwrap();
    assert!(new_slug.starts_with("evolved-"));
    let found = h.registry.get_playlist_group(&new_slug).await.unwrap().unwrap();
    assert_eq!(found.id, group.id);

    assert!(h.registry.reconcile().await.unwrap().is_clean());
}

#[tokio::test]
async fn lookups_route_by_id_or_slug() {
    let h = harness();
    let created = h.registry.create_playlist(sample_playlist("Routing Test")).await.unwrap();
    let slug = created.slug.clone().unwrap();

    let by_id = h.registry.get_playlist(&created.id).await.unwrap().unwrap();
    let by_slug = h.registry.get_playlist(&slug).await.unwrap().unwrap();
    assert_eq!(by_id, by_slug);

    // A slug never resolves through the ID index, nor an ID through slugs.
    assert!(h.registry.get_playlist("routing-test").await.unwrap().is_none());
    assert!(h
        .registry
        .get_playlist("00000000-0000-4000-8000-000000000000")
        .await
        .unwrap()
        .is_none());
    assert!(h.registry.get_playlist_group(&slug).await.unwrap().is_none());

    assert!(matches!(
        h.registry
            .list_playlists_in_group("missing-group", &ListQuery::default())
            .await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_playlist_leaves_group_consistent() {
    let h = harness();
    let kept = h.registry.create_playlist(sample_playlist("Kept")).await.unwrap();
    let doomed = h.registry.create_playlist(sample_playlist("Doomed")).await.unwrap();
    let kept_url = format!("{REGISTRY}/{}", kept.id);
    let doomed_url = format!("{REGISTRY}/{}", doomed.id);
    let group = h
        .registry
        .create_playlist_group(sample_group("Members", &[kept_url.as_str(), doomed_url.as_str()]))
        .await
        .unwrap();

    assert!(h.registry.delete_playlist(&doomed.id).await.unwrap());
    assert!(!h.registry.delete_playlist(&doomed.id).await.unwrap());
    assert_eq!(member_ids(&h.registry, &group.id).await, vec![kept.id.clone()]);
    assert!(h.registry.reconcile().await.unwrap().is_clean());

    assert!(h.registry.delete_playlist_group(&group.id).await.unwrap());
    assert!(h.registry.get_playlist(&kept.id).await.unwrap().is_some());
    assert!(h.store.list_all(dp1::keys::MEMBERSHIP_PREFIX).await.unwrap().is_empty());
}

#[tokio::test]
async fn external_members_survive_reconcile() {
    let h = harness();
    let external = sample_playlist("Remote Only");
    let url = format!("{FEED}/{}", external.id);
    publish(&h.fetcher, &url, &external);

    let group = h
        .registry
        .create_playlist_group(sample_group("Remote", &[url.as_str()]))
        .await
        .unwrap();
    assert_eq!(member_ids(&h.registry, &group.id).await, vec![external.id.clone()]);

    assert!(h.registry.reconcile().await.unwrap().is_clean());
    assert_eq!(member_ids(&h.registry, &group.id).await, vec![external.id.clone()]);
}

#[tokio::test]
async fn imported_playlists_never_repoint_slugs() {
    let h = harness();
    let mut local = sample_playlist("Local");
    local.slug = Some("shared-1234".into());
    h.registry.save_playlist(&local).await.unwrap();

    let mut clash = sample_playlist("Remote Clash");
    clash.slug = Some("shared-1234".into());
    let mut first = sample_playlist("Remote First");
    first.slug = Some("fresh-5678".into());
    let mut second = sample_playlist("Remote Second");
    second.slug = Some("fresh-5678".into());

    let mut urls = Vec::new();
    for p in [&clash, &first, &second] {
        let url = format!("{FEED}/{}", p.id);
        publish(&h.fetcher, &url, p);
        urls.push(url);
    }
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let group = h
        .registry
        .create_playlist_group(sample_group("Clashing", &refs))
        .await
        .unwrap();

    let by_slug = h.registry.get_playlist("shared-1234").await.unwrap().unwrap();
    assert_eq!(by_slug.id, local.id);
    let by_slug = h.registry.get_playlist("fresh-5678").await.unwrap().unwrap();
    assert_eq!(by_slug.id, first.id);

    // Imported all the same, reachable by ID.
    assert!(h.registry.get_playlist(&clash.id).await.unwrap().is_some());
    assert!(h.registry.get_playlist(&second.id).await.unwrap().is_some());
    assert_eq!(member_ids(&h.registry, &group.id).await.len(), 3);
    assert!(h.registry.reconcile().await.unwrap().is_clean());
}

#[tokio::test]
async fn external_signatures_cover_the_received_bytes() {
    use dp1::core::canonical::fields;
    use dp1::core::hash::sha256;
    use dp1::core::playlist::signable_bytes;
    use dp1::core::{SignatureAlg, SignatureRecord};

    init_test_tracing();
    let fixture = TestFixture::new();
    let fetcher = Arc::new(MemoryFetcher::new());
    let registry = Registry::new(
        Arc::new(MemoryKv::new()),
        fetcher.clone(),
        RegistryConfig::default(),
    )
    .unwrap()
    .with_trust(fixture.trust_store(), fixture.policy());

    // Signed with an explicit null member, as another implementation may send it.
    let playlist = sample_playlist("Null Slug");
    let mut body = serde_json::to_value(&playlist).unwrap();
    body["slug"] = serde_json::Value::Null;
    let digest = sha256(&signable_bytes(&body, &[fields::SIGNATURE, fields::SIGNATURES]).unwrap());
    let (keypair, kid) = fixture.signer(Role::Curator);
    let record = SignatureRecord {
        alg: SignatureAlg::Ed25519,
        kid: kid.into(),
        ts: dp1::core::now_rfc3339(),
        payload_hash: digest.to_prefixed(),
        role: Role::Curator,
        sig: keypair.sign(digest.as_bytes()).to_base64url(),
    };
    body["signatures"] = serde_json::to_value(vec![record]).unwrap();

    let url = format!("{FEED}/{}", playlist.id);
    fetcher.insert_json(&url, &body);
    let group = registry
        .create_playlist_group(sample_group("Raw", &[url.as_str()]))
        .await
        .unwrap();
    let page = registry
        .list_playlists_in_group(&group.id, &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn trust_policy_gates_external_playlists() {
    init_test_tracing();
    let fixture = TestFixture::new();
    let fetcher = Arc::new(MemoryFetcher::new());
    let registry = Registry::new(
        Arc::new(MemoryKv::new()),
        fetcher.clone(),
        RegistryConfig::default(),
    )
    .unwrap()
    .with_trust(fixture.trust_store(), fixture.policy());

    let unsigned = sample_playlist("Unsigned");
    let unsigned_url = format!("{FEED}/{}", unsigned.id);
    publish(&fetcher, &unsigned_url, &unsigned);
    let err = registry
        .create_playlist_group(sample_group("Rejected", &[unsigned_url.as_str()]))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ReferenceUnresolvable { .. }));

    let signed = fixture.signed_playlist("Signed", &[Role::Curator]);
    let signed_url = format!("{FEED}/{}", signed.id);
    publish(&fetcher, &signed_url, &signed);

    let mut legacy = sample_playlist("Legacy");
    fixture.sign_legacy(&mut legacy);
    let legacy_url = format!("{FEED}/{}", legacy.id);
    publish(&fetcher, &legacy_url, &legacy);

    let group = registry
        .create_playlist_group(sample_group("Accepted", &[signed_url.as_str(), legacy_url.as_str()]))
        .await
        .unwrap();
    let page = registry
        .list_playlists_in_group(&group.id, &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn server_signer_signs_created_playlists() {
    init_test_tracing();
    let fixture = TestFixture::new();
    let registry = Registry::new(
        Arc::new(MemoryKv::new()),
        Arc::new(MemoryFetcher::new()),
        RegistryConfig::default(),
    )
    .unwrap()
    .with_signer(ServerSigner::Chain {
        keypair: fixture.feed.clone(),
        kid: dp1_testkit::fixtures::FEED_KID.into(),
        role: Role::Feed,
    });

    let created = registry.create_playlist(sample_playlist("Served")).await.unwrap();
    let stored = registry.get_playlist(&created.id).await.unwrap().unwrap();
    let verified = dp1::core::verify_playlist(&stored, &fixture.trust_store(), &fixture.policy())
        .await
        .unwrap();
    assert!(verified.has(Role::Feed));
}

#[tokio::test]
async fn list_playlists_in_group_paginates() {
    let h = harness();
    let mut urls = Vec::new();
    for i in 0..5 {
        let p = h
            .registry
            .create_playlist(sample_playlist(&format!("Page {i}")))
            .await
            .unwrap();
        urls.push(format!("{REGISTRY}/{}", p.id));
    }
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let group = h
        .registry
        .create_playlist_group(sample_group("Paged", &refs))
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut query = ListQuery::default().with_limit(2);
    loop {
        let page = h.registry.list_playlists_in_group(&group.id, &query).await.unwrap();
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|p| p.id.clone()));
        if !page.has_more() {
            break;
        }
        query = query.after(page.cursor);
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn sqlite_registry_persists_across_reopen() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    let created = {
        let registry = Registry::new(
            SqliteKv::open(&path).unwrap(),
            MemoryFetcher::new(),
            RegistryConfig::default(),
        )
        .unwrap();
        registry.create_playlist(sample_playlist("Durable")).await.unwrap()
    };

    let registry = Registry::new(
        SqliteKv::open(&path).unwrap(),
        MemoryFetcher::new(),
        RegistryConfig::default(),
    )
    .unwrap();
    let slug = created.slug.clone().unwrap();
    let found = registry.get_playlist(&slug).await.unwrap().unwrap();
    assert_eq!(found, created);
}

#[test]
fn capsule_matches_declared_assets() {
    init_test_tracing();
    let dir = capsule_dir(&[
        ("index.html", b"<html></html>".as_slice()),
        ("js/draw.js", b"draw()".as_slice()),
    ]);
    let playlist = playlist_with_assets(
        "Capsule",
        vec![sha256_hex(b"<html></html>"), sha256_hex(b"draw()")],
    );

    let verifier = CapsuleVerifier::new(ScanConfig::default());
    let result = verifier
        .verify_playlist(&playlist, VerificationTarget::Directory(dir.path().to_path_buf()))
        .unwrap();
    assert!(result.success);
    assert_eq!(result.total_files, 2);

    std::fs::write(dir.path().join("js/draw.js"), b"tampered()").unwrap();
    let result = verifier
        .verify_playlist(&playlist, VerificationTarget::Directory(dir.path().to_path_buf()))
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.missing, vec![sha256_hex(b"draw()")]);
    assert_eq!(result.extra, vec![sha256_hex(b"tampered()")]);
}
