//! The key-value contract the registry persists through.
//!
//! Stores only offer get/put/delete and prefix listing with a cursor. All
//! secondary indexing is done by callers through explicit extra keys.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Largest page a store returns from a single `list` call.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Parameters for [`KvStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Page size; `None` or values above [`MAX_LIST_LIMIT`] use the cap.
    pub limit: Option<usize>,
    /// Continuation cursor from a previous page.
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub(crate) fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// One page of keys, in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Present exactly when more keys follow.
    pub cursor: Option<String>,
    pub complete: bool,
}

/// Async key-value storage.
///
/// Writes to different keys are independent: nothing here promises that a
/// batch lands atomically, even where a backend happens to provide it.
#[async_trait]
pub trait KvStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Single-key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// List keys by prefix, one page at a time.
    async fn list(&self, options: &ListOptions) -> Result<ListPage>;

    // ─────────────────────────────────────────────────────────────────────────
    // Batch Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Write several entries. The default issues sequential puts.
    async fn put_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }

    /// Remove several keys. The default issues sequential deletes.
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn list(&self, options: &ListOptions) -> Result<ListPage> {
        (**self).list(options).await
    }

    async fn put_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        (**self).put_many(entries).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        (**self).delete_many(keys).await
    }
}

/// JSON and listing conveniences over any [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Get and deserialize a JSON value.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a JSON value.
    async fn put_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes).await
    }

    /// Get a UTF-8 string value.
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::InvalidData(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Walk every page under `prefix` and collect all keys.
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut options = ListOptions::prefix(prefix);
        loop {
            let page = self.list(&options).await?;
            keys.extend(page.keys);
            match page.cursor {
                Some(cursor) if !page.complete => options.cursor = Some(cursor),
                _ => return Ok(keys),
            }
        }
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Encode the last key of a page as an opaque cursor.
pub(crate) fn encode_cursor(last_key: &str) -> String {
    URL_SAFE_NO_PAD.encode(last_key.as_bytes())
}

/// Decode a cursor produced by [`encode_cursor`].
pub(crate) fn decode_cursor(cursor: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| StoreError::InvalidCursor(cursor.to_string()))?;
    String::from_utf8(bytes).map_err(|_| StoreError::InvalidCursor(cursor.to_string()))
}

/// Trim a `limit + 1` fetch to a page and derive its cursor.
pub(crate) fn paginate(keys: &mut Vec<String>, limit: usize) -> ListPage {
    let more = keys.len() > limit;
    keys.truncate(limit);
    let cursor = if more {
        keys.last().map(|k| encode_cursor(k))
    } else {
        None
    };
    ListPage {
        keys: std::mem::take(keys),
        complete: cursor.is_none(),
        cursor,
    }
}
