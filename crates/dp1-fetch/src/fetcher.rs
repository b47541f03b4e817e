//! Fetcher trait and implementations
//!
//! Provides the transport abstraction the registry uses to resolve playlist
//! URLs that are not hosted locally:
//! - HTTP/HTTPS via reqwest
//! - In-memory responses for tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::debug;
use url::Url;

use crate::error::{FetchError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a response body.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// User agent sent with every request.
pub const USER_AGENT: &str = "DP-1-Validator/1.0";

/// Trait for fetching raw documents by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body at `url`.
    ///
    /// Any non-success status is an error; the body of an error response is
    /// discarded.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// HTTP fetcher using reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_size: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the default 30 second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            timeout,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        })
    }

    /// Reject response bodies larger than `limit` bytes.
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    fn too_large(&self, url: &Url) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_size,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(%url, "fetching via HTTP");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_size as u64)
        {
            return Err(self.too_large(url));
        }

        // Content-Length may be absent or wrong, so count as chunks arrive.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?
        {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = body.len(), "fetched");
        Ok(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

pub mod memory {
    //! In-memory fetcher for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    enum Response {
        Body(Vec<u8>),
        Status(u16),
    }

    /// Serves canned responses and counts requests per URL.
    ///
    /// URLs without a canned response answer 404.
    #[derive(Debug, Default)]
    pub struct MemoryFetcher {
        responses: Mutex<HashMap<String, Response>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `body` for `url`.
        pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
            if let Ok(mut responses) = self.responses.lock() {
                responses.insert(url.into(), Response::Body(body.into()));
            }
        }

        /// Serve the JSON encoding of `value` for `url`.
        pub fn insert_json(&self, url: impl Into<String>, value: &serde_json::Value) {
            self.insert(url, value.to_string().into_bytes());
        }

        /// Answer `url` with an error status.
        pub fn insert_status(&self, url: impl Into<String>, status: u16) {
            if let Ok(mut responses) = self.responses.lock() {
                responses.insert(url.into(), Response::Status(status));
            }
        }

        /// Number of requests made for `url`.
        pub fn calls(&self, url: &str) -> usize {
            self.calls
                .lock()
                .map(|c| c.get(url).copied().unwrap_or(0))
                .unwrap_or(0)
        }

        /// Number of requests made for any URL.
        pub fn total_calls(&self) -> usize {
            self.calls.lock().map(|c| c.values().sum()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
            let key = url.as_str();
            if let Ok(mut calls) = self.calls.lock() {
                *calls.entry(key.to_string()).or_insert(0) += 1;
            }

            let response = self
                .responses
                .lock()
                .map_err(|_| FetchError::Network {
                    url: key.to_string(),
                    message: "response table poisoned".to_string(),
                })?
                .get(key)
                .cloned();

            match response {
                Some(Response::Body(body)) => Ok(body),
                Some(Response::Status(status)) => Err(FetchError::Status {
                    url: key.to_string(),
                    status,
                }),
                None => Err(FetchError::Status {
                    url: key.to_string(),
                    status: 404,
                }),
            }
        }

        fn name(&self) -> &str {
            "memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryFetcher;
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_memory_fetcher_counts_calls() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://feed.example/p/1", b"{}".to_vec());

        assert_eq!(fetcher.fetch(&url("https://feed.example/p/1")).await.unwrap(), b"{}");
        assert_eq!(fetcher.fetch(&url("https://feed.example/p/1")).await.unwrap(), b"{}");
        assert_eq!(fetcher.calls("https://feed.example/p/1"), 2);
        assert_eq!(fetcher.calls("https://feed.example/p/2"), 0);
    }

    #[tokio::test]
    async fn test_memory_fetcher_statuses() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert_status("https://feed.example/gone", 410);

        match fetcher.fetch(&url("https://feed.example/gone")).await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 410),
            other => panic!("unexpected: {other:?}"),
        }
        match fetcher.fetch(&url("https://feed.example/unknown")).await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_arc_fetcher_delegates() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("https://feed.example/a", b"a".to_vec());
        let shared: Arc<dyn Fetcher> = fetcher.clone();
        assert_eq!(shared.fetch(&url("https://feed.example/a")).await.unwrap(), b"a");
        assert_eq!(shared.name(), "memory");
        assert_eq!(fetcher.calls("https://feed.example/a"), 1);
    }

    /// Answer a single request on a loopback port with `response`.
    fn serve_once(response: Vec<u8>) -> Url {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(&response);
            }
        });
        url(&format!("http://{addr}/playlist"))
    }

    fn http_response(body: &[u8], declare_length: bool) -> Vec<u8> {
        let mut head = String::from("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n");
        if declare_length {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("Connection: close\r\n\r\n");
        let mut response = head.into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[tokio::test]
    async fn test_http_body_within_cap() {
        let fetcher = HttpFetcher::new().unwrap().with_max_body_size(64);
        let target = serve_once(http_response(br#"{"ok":true}"#, true));
        assert_eq!(fetcher.fetch(&target).await.unwrap(), br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_http_declared_length_over_cap() {
        let fetcher = HttpFetcher::new().unwrap().with_max_body_size(16);
        let target = serve_once(http_response(&[b'x'; 64], true));
        match fetcher.fetch(&target).await {
            Err(FetchError::TooLarge { limit, .. }) => assert_eq!(limit, 16),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_undeclared_length_over_cap() {
        let fetcher = HttpFetcher::new().unwrap().with_max_body_size(16);
        let target = serve_once(http_response(&[b'x'; 64], false));
        assert!(matches!(
            fetcher.fetch(&target).await,
            Err(FetchError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_default_cap() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.max_body_size(), DEFAULT_MAX_BODY_SIZE);
        assert_eq!(fetcher.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_http_fetcher_builds() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(5));
        assert_eq!(fetcher.name(), "http");
        assert_eq!(HttpFetcher::new().unwrap().timeout(), DEFAULT_TIMEOUT);
    }
}
