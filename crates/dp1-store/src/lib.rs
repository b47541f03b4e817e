//! # DP-1 Store
//!
//! The key-value persistence contract used by the DP-1 registry, with a
//! SQLite backend and an in-memory backend for tests.
//!
//! ## Key Types
//!
//! - [`KvStore`] - async get/put/delete, prefix listing, batch writes
//! - [`KvStoreExt`] - JSON helpers and exhaustive listing
//! - [`SqliteKv`] - SQLite-backed store
//! - [`MemoryKv`] - in-memory store
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dp1_store::{KvStore, ListOptions, SqliteKv};
//!
//! async fn example() -> dp1_store::Result<()> {
//!     let store = SqliteKv::open("registry.db")?;
//!     store.put("playlist:slug:genesis-1234", b"385f79b6-...").await?;
//!     let page = store.list(&ListOptions::prefix("playlist:slug:")).await?;
//!     assert!(page.complete);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No secondary indexes**: callers index through explicit extra keys
//! - **Opaque cursors**: a cursor is only meaningful to the store that issued it
//! - **Batches are not a consistency promise**: SQLite happens to commit a
//!   batch in one transaction, but callers must tolerate partial writes

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;
pub use traits::{KvStore, KvStoreExt, ListOptions, ListPage, MAX_LIST_LIMIT};
