//! Classification of playlist references in groups.

use url::Url;

use dp1_core::Playlist;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Where a group's playlist URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Served by this registry: look `identifier` (ID or slug) up locally.
    SelfHosted { url: Url, identifier: String },
    /// Anywhere else: fetch over the network.
    External(Url),
}

impl Reference {
    /// Classify `raw` against the configured self-hosted origins.
    pub fn classify(raw: &str, config: &RegistryConfig) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| RegistryError::unresolvable(raw, e))?;
        if url.host_str().is_none() {
            return Err(RegistryError::unresolvable(raw, "URL has no host"));
        }

        if config.self_hosted_origin(&url).is_some() {
            let identifier = last_path_segment(&url)
                .ok_or_else(|| RegistryError::unresolvable(raw, "URL has no playlist identifier"))?;
            return Ok(Reference::SelfHosted { url, identifier });
        }
        Ok(Reference::External(url))
    }

    pub fn url(&self) -> &Url {
        match self {
            Reference::SelfHosted { url, .. } | Reference::External(url) => url,
        }
    }

    pub fn is_self_hosted(&self) -> bool {
        matches!(self, Reference::SelfHosted { .. })
    }
}

/// The last non-empty path segment.
pub fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// A group reference resolved to a playlist.
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    /// The URL exactly as it appears in the group.
    pub url: String,
    pub playlist: Playlist,
    pub self_hosted: bool,
}
