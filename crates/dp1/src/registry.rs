//! The Registry: dual-indexed persistence for playlists and playlist groups.
//!
//! Every record is stored under its ID with a slug pointer beside it, and
//! each group's membership is indexed under a prefix that can be scanned
//! to list the playlists in that group.
//!
//! Writes for one operation are issued as a single batch. The store does
//! not promise that a batch lands atomically, so a crash can leave orphaned
//! slug pointers or membership entries; [`Registry::reconcile`] removes
//! them. Two concurrent saves of the same group race on membership pruning
//! and the last writer wins.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use dp1_core::{
    looks_like_uuid, now_rfc3339, KeyResolver, Playlist, PlaylistGroup, PlaylistValidator,
    SignatureVerifier, TrustPolicy, DP_VERSION,
};
use dp1_fetch::{Fetcher, HttpFetcher};
use dp1_store::{KvStore, KvStoreExt, ListOptions, ListPage};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::keys::{self, RecordKind};
use crate::resolve::{Reference, ResolvedReference};
use crate::signer::ServerSigner;
use crate::slug::generate_slug;

/// Paging parameters for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Requested page size, capped by the configuration.
    pub limit: Option<usize>,
    /// Cursor returned by the previous page.
    pub cursor: Option<String>,
}

impl ListQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One page of decoded records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present exactly when more records follow.
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Index entries removed by [`Registry::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub playlist_slugs: Vec<String>,
    pub group_slugs: Vec<String>,
    pub memberships: Vec<String>,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.playlist_slugs.len() + self.group_slugs.len() + self.memberships.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Playlist and playlist-group registry over a key-value store.
pub struct Registry<K, F> {
    store: K,
    fetcher: F,
    config: RegistryConfig,
    validator: PlaylistValidator,
    signer: Option<ServerSigner>,
    verifier: Option<SignatureVerifier<Arc<dyn KeyResolver>>>,
}

impl<K: KvStore> Registry<K, HttpFetcher> {
    /// Create a registry that fetches external references over HTTP with
    /// the configured timeout and body cap.
    pub fn with_http(store: K, config: RegistryConfig) -> Result<Self> {
        let fetcher = HttpFetcher::with_timeout(config.fetch_timeout())?
            .with_max_body_size(config.max_fetch_bytes);
        Self::new(store, fetcher, config)
    }
}

impl<K: KvStore, F: Fetcher> Registry<K, F> {
    /// Create a registry instance.
    pub fn new(store: K, fetcher: F, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            fetcher,
            validator: PlaylistValidator::new(config.validation.clone()),
            config,
            signer: None,
            verifier: None,
        })
    }

    /// Sign created and updated playlists with this signer.
    pub fn with_signer(mut self, signer: ServerSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Require externally fetched group members to satisfy `policy`.
    pub fn with_trust(mut self, resolver: impl KeyResolver + 'static, policy: TrustPolicy) -> Self {
        let resolver: Arc<dyn KeyResolver> = Arc::new(resolver);
        self.verifier = Some(SignatureVerifier::new(resolver, policy));
        self
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn validator(&self) -> &PlaylistValidator {
        &self.validator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playlists
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and store a playlist under its ID and slug.
    ///
    /// If the stored record had a different slug, the old slug pointer is
    /// removed as long as it still points at this playlist.
    pub async fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.validator.validate_playlist(playlist)?;

        let previous: Option<Playlist> = self.load(RecordKind::Playlist, &playlist.id).await?;
        let mut writes = Vec::with_capacity(2);
        push_record(&mut writes, RecordKind::Playlist, &playlist.id, playlist.slug.as_deref(), playlist)?;
        self.store.put_many(&writes).await?;

        let old_slug = previous.and_then(|p| p.slug);
        self.drop_stale_slug(RecordKind::Playlist, &playlist.id, old_slug, playlist.slug.as_deref())
            .await?;

        info!(id = %playlist.id, slug = ?playlist.slug, items = playlist.items.len(), "saved playlist");
        Ok(())
    }

    /// Store a new playlist with a fresh ID, creation time and slug,
    /// signed by the server signer when one is configured.
    pub async fn create_playlist(&self, mut playlist: Playlist) -> Result<Playlist> {
        playlist.id = uuid::Uuid::new_v4().to_string();
        playlist.created = now_rfc3339();
        if playlist.dp_version.is_empty() {
            playlist.dp_version = DP_VERSION.to_string();
        }
        playlist.slug = Some(generate_slug(playlist.title.as_deref().unwrap_or_default()));
        self.sign(&mut playlist)?;

        self.save_playlist(&playlist).await?;
        Ok(playlist)
    }

    /// Replace the playlist found by `identifier`, keeping its ID and
    /// creation time. The slug is regenerated from the title and the
    /// signature recomputed.
    pub async fn update_playlist(&self, identifier: &str, mut playlist: Playlist) -> Result<Playlist> {
        let existing = self
            .get_playlist(identifier)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("playlist {identifier}")))?;

        playlist.id = existing.id;
        playlist.created = existing.created;
        if playlist.dp_version.is_empty() {
            playlist.dp_version = existing.dp_version;
        }
        playlist.slug = Some(generate_slug(playlist.title.as_deref().unwrap_or_default()));
        self.sign(&mut playlist)?;

        self.save_playlist(&playlist).await?;
        Ok(playlist)
    }

    /// Look a playlist up by UUID or slug. Absent is `Ok(None)`.
    pub async fn get_playlist(&self, identifier: &str) -> Result<Option<Playlist>> {
        self.get_by_id_or_slug(RecordKind::Playlist, identifier).await
    }

    /// Delete a playlist, its slug pointer and every membership entry that
    /// names it. Returns whether anything was deleted.
    pub async fn delete_playlist(&self, identifier: &str) -> Result<bool> {
        let Some(playlist) = self.get_playlist(identifier).await? else {
            return Ok(false);
        };

        let mut deletes = vec![keys::playlist_id(&playlist.id)];
        if let Some(key) = self.owned_slug_key(RecordKind::Playlist, &playlist.id, playlist.slug.as_deref()).await? {
            deletes.push(key);
        }
        for key in self.store.list_all(keys::MEMBERSHIP_PREFIX).await? {
            if matches!(keys::parse_membership(&key), Some((_, p)) if p == playlist.id) {
                deletes.push(key);
            }
        }

        self.store.delete_many(&deletes).await?;
        info!(id = %playlist.id, keys = deletes.len(), "deleted playlist");
        Ok(true)
    }

    /// List stored playlists in ID order.
    pub async fn list_playlists(&self, query: &ListQuery) -> Result<Page<Playlist>> {
        self.list_records(RecordKind::Playlist, query).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playlist Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a group, resolve every referenced playlist, and store it.
    ///
    /// References are resolved concurrently. URLs on a self-hosted origin
    /// are looked up in the local store and never fetched. If any
    /// reference fails, nothing is written. On success the group's old
    /// membership entries are replaced by exactly the resolved set.
    pub async fn save_playlist_group(&self, group: &PlaylistGroup) -> Result<()> {
        self.validator.validate_group(group)?;

        let resolved = self.resolve_references(&group.playlists).await?;

        let mut writes = Vec::new();
        push_record(&mut writes, RecordKind::Group, &group.id, group.slug.as_deref(), group)?;

        // Every member ends up stored locally, so each membership entry
        // names a live playlist record.
        let mut members = BTreeSet::new();
        let mut claimed_slugs = BTreeSet::new();
        for reference in &resolved {
            let playlist = &reference.playlist;
            if !members.insert(playlist.id.clone()) {
                continue;
            }
            writes.push((
                keys::membership(&group.id, &playlist.id),
                playlist.id.clone().into_bytes(),
            ));
            if !reference.self_hosted {
                self.push_import(&mut writes, &mut claimed_slugs, reference).await?;
            }
        }

        let previous: Option<PlaylistGroup> = self.load(RecordKind::Group, &group.id).await?;
        let stale = self.store.list_all(&keys::membership_prefix(&group.id)).await?;
        if !stale.is_empty() {
            debug!(group = %group.id, entries = stale.len(), "pruning membership entries");
            self.store.delete_many(&stale).await?;
        }

        self.store.put_many(&writes).await?;

        let old_slug = previous.and_then(|g| g.slug);
        self.drop_stale_slug(RecordKind::Group, &group.id, old_slug, group.slug.as_deref())
            .await?;

        info!(id = %group.id, slug = ?group.slug, playlists = members.len(), "saved playlist group");
        Ok(())
    }

    /// Store a new group with a fresh ID, creation time and slug.
    pub async fn create_playlist_group(&self, mut group: PlaylistGroup) -> Result<PlaylistGroup> {
        group.id = uuid::Uuid::new_v4().to_string();
        group.created = Some(now_rfc3339());
        if group.dp_version.is_none() {
            group.dp_version = Some(DP_VERSION.to_string());
        }
        group.slug = Some(generate_slug(&group.title));

        self.save_playlist_group(&group).await?;
        Ok(group)
    }

    /// Replace the group found by `identifier`, keeping its ID and creation
    /// time. The slug is regenerated from the title.
    pub async fn update_playlist_group(
        &self,
        identifier: &str,
        mut group: PlaylistGroup,
    ) -> Result<PlaylistGroup> {
        let existing = self
            .get_playlist_group(identifier)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("playlist group {identifier}")))?;

        group.id = existing.id;
        group.created = existing.created;
        if group.dp_version.is_none() {
            group.dp_version = existing.dp_version;
        }
        group.slug = Some(generate_slug(&group.title));

        self.save_playlist_group(&group).await?;
        Ok(group)
    }

    /// Look a group up by UUID or slug. Absent is `Ok(None)`.
    pub async fn get_playlist_group(&self, identifier: &str) -> Result<Option<PlaylistGroup>> {
        self.get_by_id_or_slug(RecordKind::Group, identifier).await
    }

    /// Delete a group with its slug pointer and membership entries.
    /// Member playlists are kept.
    pub async fn delete_playlist_group(&self, identifier: &str) -> Result<bool> {
        let Some(group) = self.get_playlist_group(identifier).await? else {
            return Ok(false);
        };

        let mut deletes = vec![keys::group_id(&group.id)];
        if let Some(key) = self.owned_slug_key(RecordKind::Group, &group.id, group.slug.as_deref()).await? {
            deletes.push(key);
        }
        deletes.extend(self.store.list_all(&keys::membership_prefix(&group.id)).await?);

        self.store.delete_many(&deletes).await?;
        info!(id = %group.id, keys = deletes.len(), "deleted playlist group");
        Ok(true)
    }

    /// List stored groups in ID order.
    pub async fn list_playlist_groups(&self, query: &ListQuery) -> Result<Page<PlaylistGroup>> {
        self.list_records(RecordKind::Group, query).await
    }

    /// List the playlists indexed as members of a group.
    ///
    /// The group is found by UUID or slug; an unknown group is
    /// [`RegistryError::NotFound`].
    pub async fn list_playlists_in_group(
        &self,
        group: &str,
        query: &ListQuery,
    ) -> Result<Page<Playlist>> {
        let group = self
            .get_playlist_group(group)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("playlist group {group}")))?;

        let page = self
            .list_by_prefix(&keys::membership_prefix(&group.id), query)
            .await?;
        let ids: Vec<&str> = page
            .keys
            .iter()
            .filter_map(|key| keys::parse_membership(key).map(|(_, playlist)| playlist))
            .collect();

        let loaded = try_join_all(ids.iter().map(|id| self.load::<Playlist>(RecordKind::Playlist, id))).await?;
        Ok(Page {
            items: loaded.into_iter().flatten().collect(),
            cursor: page.cursor,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing and Repair
    // ─────────────────────────────────────────────────────────────────────────

    /// One page of raw keys under `prefix`, with the page size capped by
    /// the configuration.
    pub async fn list_by_prefix(&self, prefix: &str, query: &ListQuery) -> Result<ListPage> {
        let options = ListOptions::prefix(prefix)
            .with_limit(self.config.page_size(query.limit))
            .with_cursor(query.cursor.clone());
        Ok(self.store.list(&options).await?)
    }

    /// Remove index entries that no longer point at a live record: slug
    /// pointers whose record is missing or carries another slug, and
    /// membership entries whose group or playlist is missing.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport {
            playlist_slugs: self.orphan_slugs::<Playlist>(RecordKind::Playlist, |p| p.slug.as_deref()).await?,
            group_slugs: self.orphan_slugs::<PlaylistGroup>(RecordKind::Group, |g| g.slug.as_deref()).await?,
            memberships: Vec::new(),
        };

        for key in self.store.list_all(keys::MEMBERSHIP_PREFIX).await? {
            let orphaned = match keys::parse_membership(&key) {
                Some((group, playlist)) => {
                    self.store.get(&keys::group_id(group)).await?.is_none()
                        || self.store.get(&keys::playlist_id(playlist)).await?.is_none()
                }
                None => true,
            };
            if orphaned {
                report.memberships.push(key);
            }
        }

        if report.is_clean() {
            debug!("reconcile found no orphaned index entries");
            return Ok(report);
        }

        let deletes: Vec<String> = report
            .playlist_slugs
            .iter()
            .chain(&report.group_slugs)
            .chain(&report.memberships)
            .cloned()
            .collect();
        self.store.delete_many(&deletes).await?;
        warn!(
            playlist_slugs = report.playlist_slugs.len(),
            group_slugs = report.group_slugs.len(),
            memberships = report.memberships.len(),
            "removed orphaned index entries"
        );
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn sign(&self, playlist: &mut Playlist) -> Result<()> {
        match &self.signer {
            Some(signer) => signer.sign(playlist)?,
            None => playlist.clear_signatures(),
        }
        Ok(())
    }

    async fn load<T: DeserializeOwned>(&self, kind: RecordKind, id: &str) -> Result<Option<T>> {
        match self.store.get(&kind.id_key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id_or_slug<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        identifier: &str,
    ) -> Result<Option<T>> {
        if looks_like_uuid(identifier) {
            return self.load(kind, identifier).await;
        }
        match self.store.get_string(&kind.slug_key(identifier)).await? {
            Some(id) => self.load(kind, &id).await,
            None => Ok(None),
        }
    }

    async fn list_records<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        query: &ListQuery,
    ) -> Result<Page<T>> {
        let page = self.list_by_prefix(kind.id_prefix(), query).await?;
        let ids: Vec<&str> = page
            .keys
            .iter()
            .filter_map(|key| keys::suffix(key, kind.id_prefix()))
            .collect();

        // A record deleted between list and get is skipped.
        let loaded = try_join_all(ids.iter().map(|id| self.load::<T>(kind, id))).await?;
        Ok(Page {
            items: loaded.into_iter().flatten().collect(),
            cursor: page.cursor,
        })
    }

    /// The slug pointer key for `slug` if it currently points at `id`.
    async fn owned_slug_key(
        &self,
        kind: RecordKind,
        id: &str,
        slug: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(slug) = slug else {
            return Ok(None);
        };
        let key = kind.slug_key(slug);
        match self.store.get_string(&key).await? {
            Some(target) if target == id => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    async fn drop_stale_slug(
        &self,
        kind: RecordKind,
        id: &str,
        old: Option<String>,
        new: Option<&str>,
    ) -> Result<()> {
        if old.as_deref() == new {
            return Ok(());
        }
        if let Some(key) = self.owned_slug_key(kind, id, old.as_deref()).await? {
            debug!(kind = kind.name(), %id, %key, "removing previous slug pointer");
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    async fn orphan_slugs<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        slug_of: impl Fn(&T) -> Option<&str>,
    ) -> Result<Vec<String>> {
        let mut orphans = Vec::new();
        for key in self.store.list_all(kind.slug_prefix()).await? {
            let Some(slug) = keys::suffix(&key, kind.slug_prefix()) else {
                orphans.push(key);
                continue;
            };
            let live = match self.store.get_string(&key).await? {
                Some(id) => match self.load::<T>(kind, &id).await? {
                    Some(record) => slug_of(&record) == Some(slug),
                    None => false,
                },
                None => false,
            };
            if !live {
                orphans.push(key);
            }
        }
        Ok(orphans)
    }

    /// Queue an externally fetched playlist for storage if it is not
    /// already held. An existing slug pointer is never repointed.
    async fn push_import(
        &self,
        writes: &mut Vec<(String, Vec<u8>)>,
        claimed_slugs: &mut BTreeSet<String>,
        reference: &ResolvedReference,
    ) -> Result<()> {
        let playlist = &reference.playlist;
        if self.store.get(&keys::playlist_id(&playlist.id)).await?.is_some() {
            return Ok(());
        }

        debug!(id = %playlist.id, url = %reference.url, "importing external playlist");
        push_record(writes, RecordKind::Playlist, &playlist.id, None, playlist)?;

        if let Some(slug) = playlist.slug.as_deref().filter(|s| !s.is_empty()) {
            let key = RecordKind::Playlist.slug_key(slug);
            if self.store.get(&key).await?.is_none() && claimed_slugs.insert(key.clone()) {
                writes.push((key, playlist.id.as_bytes().to_vec()));
            } else {
                debug!(id = %playlist.id, %slug, "slug already taken, importing without slug pointer");
            }
        }
        Ok(())
    }

    async fn resolve_references(&self, urls: &[String]) -> Result<Vec<ResolvedReference>> {
        let results = join_all(urls.iter().map(|url| self.resolve_reference(url))).await;
        let mut resolved = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(reference) => resolved.push(reference),
                Err(e) => {
                    warn!(error = %e, "rejecting playlist group");
                    return Err(e);
                }
            }
        }
        Ok(resolved)
    }

    async fn resolve_reference(&self, raw: &str) -> Result<ResolvedReference> {
        match Reference::classify(raw, &self.config)? {
            Reference::SelfHosted { identifier, .. } => {
                debug!(url = %raw, %identifier, "resolving self-hosted reference locally");
                let playlist = self
                    .get_playlist(&identifier)
                    .await
                    .map_err(|e| RegistryError::unresolvable(raw, e))?
                    .ok_or_else(|| RegistryError::unresolvable(raw, "playlist not found in local store"))?;
                Ok(ResolvedReference {
                    url: raw.to_string(),
                    playlist,
                    self_hosted: true,
                })
            }
            Reference::External(url) => {
                debug!(url = %raw, fetcher = self.fetcher.name(), "fetching external reference");
                let body = self
                    .fetcher
                    .fetch(&url)
                    .await
                    .map_err(|e| RegistryError::unresolvable(raw, e))?;
                let playlist =
                    Playlist::from_json(&body).map_err(|e| RegistryError::unresolvable(raw, e))?;
                self.validator
                    .validate_playlist(&playlist)
                    .map_err(|e| RegistryError::unresolvable(raw, e))?;

                if let Some(verifier) = &self.verifier {
                    if let Err(e) = verifier.verify_json(&body).await {
                        warn!(url = %raw, error = %e, "external playlist failed signature policy");
                        return Err(RegistryError::unresolvable(raw, e.user_message()));
                    }
                }

                Ok(ResolvedReference {
                    url: raw.to_string(),
                    playlist,
                    self_hosted: false,
                })
            }
        }
    }
}

fn push_record<T: Serialize>(
    writes: &mut Vec<(String, Vec<u8>)>,
    kind: RecordKind,
    id: &str,
    slug: Option<&str>,
    record: &T,
) -> Result<()> {
    writes.push((kind.id_key(id), serde_json::to_vec(record)?));
    if let Some(slug) = slug.filter(|s| !s.is_empty()) {
        writes.push((kind.slug_key(slug), id.as_bytes().to_vec()));
    }
    Ok(())
}
