//! # DP-1 Fetch
//!
//! Remote retrieval of DP-1 documents. The registry depends only on the
//! [`Fetcher`] trait; [`HttpFetcher`] is the production implementation and
//! [`memory::MemoryFetcher`] serves canned responses in tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dp1_fetch::{load_playlist, HttpFetcher};
//!
//! async fn example() -> dp1_fetch::Result<()> {
//!     let fetcher = HttpFetcher::new()?;
//!     let loaded = load_playlist("https://feed.example/api/v1/playlists/genesis", &fetcher).await?;
//!     println!("{} items", loaded.playlist.items.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetcher;
pub mod load;

pub use error::{FetchError, Result};
pub use fetcher::{
    memory, Fetcher, HttpFetcher, DEFAULT_MAX_BODY_SIZE, DEFAULT_TIMEOUT, USER_AGENT,
};
pub use load::{fetch_and_hash, fetch_playlist, load_playlist, parse_url, InputSource, LoadedPlaylist};
