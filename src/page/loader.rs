//! Network seam for the page runtime
//!
//! Blocking is decided here, outside the shim; the shim only ever sees the
//! resulting `load`/`error` events and image widths.

use std::collections::HashSet;
use url::Url;

/// Intrinsic width given to images that load successfully
pub const DEFAULT_IMAGE_WIDTH: u32 = 64;

/// Result of fetching a subresource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fetched; images decode to `natural_width`
    Loaded { natural_width: u32 },
    /// Blocked or otherwise failed
    Failed,
}

/// Fetches subresources on behalf of the page
pub trait ResourceLoader {
    fn fetch(&self, url: &Url) -> LoadOutcome;
}

/// Loader that fails every request matching a block list and succeeds otherwise
#[derive(Debug, Clone)]
pub struct BlockListLoader {
    hosts: HashSet<String>,
    urls: HashSet<String>,
    image_width: u32,
}

impl BlockListLoader {
    /// Create a loader that blocks nothing
    pub fn new() -> Self {
        Self {
            hosts: HashSet::new(),
            urls: HashSet::new(),
            image_width: DEFAULT_IMAGE_WIDTH,
        }
    }

    /// Block a host and all of its subdomains
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    /// Block one exact URL
    pub fn block_url(mut self, url: &Url) -> Self {
        self.urls.insert(url.to_string());
        self
    }

    /// Set the width successfully loaded images decode to
    pub fn with_image_width(mut self, width: u32) -> Self {
        self.image_width = width;
        self
    }

    /// Check whether a request would be blocked
    pub fn is_blocked(&self, url: &Url) -> bool {
        if self.urls.contains(url.as_str()) {
            return true;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|blocked| {
            host == *blocked
                || host
                    .strip_suffix(blocked.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl Default for BlockListLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLoader for BlockListLoader {
    fn fetch(&self, url: &Url) -> LoadOutcome {
        if self.is_blocked(url) {
            log::debug!("blocked request to {}", url);
            LoadOutcome::Failed
        } else {
            LoadOutcome::Loaded {
                natural_width: self.image_width,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_blocks_host_and_subdomains() {
        let loader = BlockListLoader::new().block_host("tracker.test");
        assert!(loader.is_blocked(&url("https://tracker.test/a.js")));
        assert!(loader.is_blocked(&url("https://cdn.TRACKER.test/a.js")));
        assert!(!loader.is_blocked(&url("https://nottracker.test/a.js")));
        assert!(!loader.is_blocked(&url("https://site.test/tracker.test")));
    }

    #[test]
    fn test_blocks_exact_url() {
        let blocked = url("https://site.test/pixel.gif");
        let loader = BlockListLoader::new().block_url(&blocked);
        assert_eq!(loader.fetch(&blocked), LoadOutcome::Failed);
        assert_eq!(
            loader.fetch(&url("https://site.test/logo.png")),
            LoadOutcome::Loaded {
                natural_width: DEFAULT_IMAGE_WIDTH
            }
        );
    }

    #[test]
    fn test_hostless_urls_load() {
        let loader = BlockListLoader::new().with_image_width(3);
        assert_eq!(
            loader.fetch(&url("data:image/png;base64,AAAA")),
            LoadOutcome::Loaded { natural_width: 3 }
        );
    }
}
