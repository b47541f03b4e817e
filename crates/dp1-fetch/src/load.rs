//! Loading playlists from user input.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use url::Url;

use dp1_core::hash::sha256_hex;
use dp1_core::Playlist;

use crate::error::{FetchError, Result};
use crate::fetcher::Fetcher;

/// Where a loaded playlist came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Url(Url),
    Base64,
    RawJson,
}

/// A decoded playlist together with the exact bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct LoadedPlaylist {
    pub playlist: Playlist,
    pub raw: Vec<u8>,
    pub source: InputSource,
}

/// Parse `input` as an absolute URL with a host.
pub fn parse_url(input: &str) -> Option<Url> {
    Url::parse(input.trim())
        .ok()
        .filter(|u| !u.scheme().is_empty() && u.host_str().map_or(false, |h| !h.is_empty()))
}

/// Load a playlist from a URL, a standard base64 payload, or raw JSON.
///
/// The forms are tried in that order. Input that is neither a URL nor valid
/// base64 is treated as JSON.
pub async fn load_playlist<F: Fetcher + ?Sized>(input: &str, fetcher: &F) -> Result<LoadedPlaylist> {
    let (raw, source) = if let Some(url) = parse_url(input) {
        let raw = fetcher.fetch(&url).await?;
        (raw, InputSource::Url(url))
    } else {
        match STANDARD.decode(input.trim()) {
            Ok(decoded) => (decoded, InputSource::Base64),
            Err(_) => (input.as_bytes().to_vec(), InputSource::RawJson),
        }
    };

    debug!(source = ?source, bytes = raw.len(), "decoding playlist input");
    let playlist = Playlist::from_json(&raw)?;
    Ok(LoadedPlaylist {
        playlist,
        raw,
        source,
    })
}

/// Fetch and decode the playlist at `url`.
pub async fn fetch_playlist<F: Fetcher + ?Sized>(fetcher: &F, url: &Url) -> Result<Playlist> {
    let raw = fetcher.fetch(url).await?;
    Playlist::from_json(&raw).map_err(FetchError::from)
}

/// Lowercase hex SHA-256 of the body at `url`.
pub async fn fetch_and_hash<F: Fetcher + ?Sized>(fetcher: &F, url: &Url) -> Result<String> {
    let body = fetcher.fetch(url).await?;
    Ok(sha256_hex(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::memory::MemoryFetcher;
    use dp1_core::PlaylistItem;

    fn sample_json() -> String {
        let playlist = Playlist::new(
            "Loaded",
            vec![PlaylistItem::new("https://art.example/work", 30)],
        );
        serde_json::to_string(&playlist).unwrap()
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://feed.example/api/v1/playlists/x").is_some());
        assert!(parse_url("  http://localhost:8787/p ").is_some());
        assert!(parse_url("not a url").is_none());
        assert!(parse_url("mailto:someone@example.com").is_none());
        assert!(parse_url("eyJkcFZlcnNpb24iOiIxLjAuMCJ9").is_none());
    }

    #[tokio::test]
    async fn test_load_from_url() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://feed.example/p/1", sample_json());

        let loaded = load_playlist("https://feed.example/p/1", &fetcher).await.unwrap();
        assert!(matches!(loaded.source, InputSource::Url(_)));
        assert_eq!(loaded.playlist.title.as_deref(), Some("Loaded"));
        assert_eq!(fetcher.calls("https://feed.example/p/1"), 1);
    }

    #[tokio::test]
    async fn test_load_from_base64_and_raw() {
        let fetcher = MemoryFetcher::new();
        let json = sample_json();

        let loaded = load_playlist(&STANDARD.encode(&json), &fetcher).await.unwrap();
        assert_eq!(loaded.source, InputSource::Base64);
        assert_eq!(loaded.raw, json.as_bytes());

        let loaded = load_playlist(&json, &fetcher).await.unwrap();
        assert_eq!(loaded.source, InputSource::RawJson);
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_load_errors() {
        let fetcher = MemoryFetcher::new();
        assert!(matches!(
            load_playlist("{not json", &fetcher).await,
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            load_playlist("https://feed.example/missing", &fetcher).await,
            Err(FetchError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_and_hash() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://cdn.example/asset.js", b"draw()".to_vec());
        let url = Url::parse("https://cdn.example/asset.js").unwrap();
        assert_eq!(fetch_and_hash(&fetcher, &url).await.unwrap(), sha256_hex(b"draw()"));
    }
}
