//! In-memory implementation of the KvStore trait.
//!
//! Same listing and cursor semantics as SQLite, nothing persisted. Thread-safe
//! via RwLock.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::{decode_cursor, paginate, KvStore, ListOptions, ListPage};

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every key, for assertions in tests.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        inner.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        inner.remove(key);
        Ok(())
    }

    async fn list(&self, options: &ListOptions) -> Result<ListPage> {
        let after = options.cursor.as_deref().map(decode_cursor).transpose()?;
        let limit = options.effective_limit();
        let inner = self.inner.read().map_err(StoreError::poisoned)?;

        let lower = match after {
            Some(key) if key >= options.prefix => Bound::Excluded(key),
            _ => Bound::Included(options.prefix.clone()),
        };

        // One extra key tells us whether another page exists.
        let mut keys: Vec<String> = inner
            .range((lower, Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(&options.prefix))
            .take(limit + 1)
            .cloned()
            .collect();

        Ok(paginate(&mut keys, limit))
    }

    async fn put_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        for (key, value) in entries {
            inner.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        for key in keys {
            inner.remove(key);
        }
        Ok(())
    }
}
