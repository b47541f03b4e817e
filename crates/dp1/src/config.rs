//! Registry configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use dp1_core::ValidationLimits;
use dp1_fetch::DEFAULT_MAX_BODY_SIZE;

use crate::error::{RegistryError, Result};

/// Hard cap on list page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// A host (and optionally port) that this registry serves itself.
///
/// Group references to a self-hosted origin are resolved against the local
/// store and never fetched over the network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelfHostedOrigin {
    pub host: String,
    /// When set, only URLs on this port match. Default ports are taken into
    /// account, so `443` matches `https://host/...`.
    #[serde(default)]
    pub port: Option<u16>,
}

impl SelfHostedOrigin {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Parse `host` or `host:port`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RegistryError::Config("empty self-hosted origin".into()));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.ends_with(':') => {
                let port = port.parse::<u16>().map_err(|_| {
                    RegistryError::Config(format!("invalid port in self-hosted origin: {s}"))
                })?;
                Ok(Self::new(host).with_port(port))
            }
            Some(_) => Err(RegistryError::Config(format!(
                "invalid self-hosted origin: {s}"
            ))),
            None => Ok(Self::new(s)),
        }
    }

    /// Parse a comma-separated list such as `a.example,b.example:8787`.
    /// Empty entries are skipped.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Whether `url` points at this origin.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if !host.eq_ignore_ascii_case(&self.host) {
            return false;
        }
        match self.port {
            Some(port) => url.port_or_known_default() == Some(port),
            None => true,
        }
    }
}

/// Configuration for a [`crate::Registry`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Origins served by this registry.
    pub self_hosted: Vec<SelfHostedOrigin>,
    /// Timeout for fetching external playlists, in seconds.
    pub fetch_timeout_secs: u64,
    /// Largest external playlist body accepted, in bytes.
    pub max_fetch_bytes: usize,
    /// Page size cap for listings, at most [`MAX_PAGE_SIZE`].
    pub max_page_size: usize,
    /// Page size when a listing does not ask for one.
    pub default_page_size: usize,
    /// Limits for structural validation.
    pub validation: ValidationLimits,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            self_hosted: Vec::new(),
            fetch_timeout_secs: 30,
            max_fetch_bytes: DEFAULT_MAX_BODY_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: MAX_PAGE_SIZE,
            validation: ValidationLimits::default(),
        }
    }
}

impl RegistryConfig {
    /// Parse and check a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RegistryError::Config(format!("invalid registry config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_self_hosted(mut self, origin: SelfHostedOrigin) -> Self {
        self.self_hosted.push(origin);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE {
            return Err(RegistryError::Config(format!(
                "max_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(RegistryError::Config(
                "default_page_size must be between 1 and max_page_size".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(RegistryError::Config("fetch_timeout_secs must be positive".into()));
        }
        if self.max_fetch_bytes == 0 {
            return Err(RegistryError::Config("max_fetch_bytes must be positive".into()));
        }
        Ok(())
    }

    /// The self-hosted origin `url` points at, if any.
    pub fn self_hosted_origin(&self, url: &Url) -> Option<&SelfHostedOrigin> {
        self.self_hosted.iter().find(|origin| origin.matches(url))
    }

    /// Effective page size for a requested limit.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_list() {
        let origins = SelfHostedOrigin::parse_list(" Registry.Example , localhost:8787,,").unwrap();
        assert_eq!(
            origins,
            vec![
                SelfHostedOrigin::new("registry.example"),
                SelfHostedOrigin::new("localhost").with_port(8787),
            ]
        );
        assert!(SelfHostedOrigin::parse_list("host:notaport").is_err());
        assert!(SelfHostedOrigin::parse(":80").is_err());
        assert!(SelfHostedOrigin::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_matches() {
        let any_port = SelfHostedOrigin::new("registry.example");
        assert!(any_port.matches(&url("https://REGISTRY.example/api/v1/playlists/x")));
        assert!(any_port.matches(&url("http://registry.example:9000/p")));
        assert!(!any_port.matches(&url("https://feed.example/p")));
        assert!(!any_port.matches(&url("https://sub.registry.example/p")));

        let pinned = SelfHostedOrigin::new("localhost").with_port(8787);
        assert!(pinned.matches(&url("http://localhost:8787/p")));
        assert!(!pinned.matches(&url("http://localhost:8788/p")));
        assert!(!pinned.matches(&url("http://localhost/p")));

        let https = SelfHostedOrigin::new("registry.example").with_port(443);
        assert!(https.matches(&url("https://registry.example/p")));
    }

    #[test]
    fn test_from_json() {
        let config = RegistryConfig::from_json(
            r#"{"self_hosted":[{"host":"registry.example"},{"host":"localhost","port":8787}],"fetch_timeout_secs":10}"#,
        )
        .unwrap();
        assert_eq!(config.self_hosted.len(), 2);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(config.max_fetch_bytes, DEFAULT_MAX_BODY_SIZE);

        assert!(matches!(
            RegistryConfig::from_json(r#"{"max_page_size":500}"#),
            Err(RegistryError::Config(_))
        ));
        assert!(matches!(
            RegistryConfig::from_json(r#"{"max_fetch_bytes":0}"#),
            Err(RegistryError::Config(_))
        ));
        assert!(matches!(
            RegistryConfig::from_json("not json"),
            Err(RegistryError::Config(_))
        ));
    }

    #[test]
    fn test_page_size() {
        let config = RegistryConfig::default();
        assert_eq!(config.page_size(None), 100);
        assert_eq!(config.page_size(Some(10)), 10);
        assert_eq!(config.page_size(Some(1000)), 100);
        assert_eq!(config.page_size(Some(0)), 1);
    }
}
