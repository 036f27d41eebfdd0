//! Scripted page descriptions
//!
//! A fixture lists what a page contains and does; `replay` walks a window
//! through it the way a parser and page scripts would.

use super::{BlockListLoader, OpenArgs, Window};
use crate::utils::{Result, ShieldsError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;
use url::Url;

/// A page and the resource loads it performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageFixture {
    /// Page URL; must be absolute
    pub url: String,
    /// Hosts (and their subdomains) the network layer blocks
    pub blocked_hosts: Vec<String>,
    /// `<script src>` elements present in the markup
    pub scripts: Vec<String>,
    /// `<img src>` elements present in the markup
    pub images: Vec<String>,
    /// URLs fetched with synchronous XHR
    pub sync_xhrs: Vec<String>,
    /// URLs fetched with asynchronous XHR
    pub async_xhrs: Vec<String>,
    /// Scripts inserted by page code after parsing
    pub dynamic_scripts: Vec<String>,
    /// URLs assigned to `new Image().src`
    pub image_assignments: Vec<String>,
}

impl Default for PageFixture {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            blocked_hosts: Vec::new(),
            scripts: Vec::new(),
            images: Vec::new(),
            sync_xhrs: Vec::new(),
            async_xhrs: Vec::new(),
            dynamic_scripts: Vec::new(),
            image_assignments: Vec::new(),
        }
    }
}

impl PageFixture {
    /// A small news page with a handful of trackers
    pub fn demo() -> Self {
        Self {
            url: "https://news.example/article".to_string(),
            blocked_hosts: vec!["tracker.test".to_string(), "ads.example".to_string()],
            scripts: vec![
                "/static/app.js".to_string(),
                "https://cdn.tracker.test/analytics.js".to_string(),
            ],
            images: vec![
                "/static/logo.png".to_string(),
                "https://ads.example/banner.gif".to_string(),
            ],
            sync_xhrs: vec![
                "/api/session".to_string(),
                "https://tracker.test/collect?sync=1".to_string(),
            ],
            async_xhrs: vec!["https://tracker.test/collect?async=1".to_string()],
            dynamic_scripts: vec!["https://ads.example/loader.js".to_string()],
            image_assignments: vec!["//tracker.test/pixel.gif".to_string()],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON fixture file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Create the window for this page, with its block list wired in
    pub fn build(&self) -> Result<Rc<Window>> {
        let url = Url::parse(&self.url).map_err(|e| ShieldsError::invalid_url(&self.url, e))?;
        let loader = self
            .blocked_hosts
            .iter()
            .fold(BlockListLoader::new(), |loader, host| loader.block_host(host.as_str()));
        Ok(Window::new(url, Rc::new(loader)))
    }

    /// Drive `window` through the page: parse the markup, run page code,
    /// then finish loading
    pub fn replay(&self, window: &Window) {
        let document = window.document();

        for src in &self.scripts {
            let script = document.create_element("script");
            script.set_attribute("src", src);
            window.insert(document.head(), script.into());
        }
        for src in &self.images {
            let image = document.create_element("img");
            image.set_attribute("src", src);
            window.insert(document.body(), image.into());
        }
        window.run_microtasks();

        for url in &self.sync_xhrs {
            self.request(window, url, false);
        }
        for url in &self.async_xhrs {
            self.request(window, url, true);
        }
        for src in &self.dynamic_scripts {
            let script = document.create_element("script");
            script.set_attribute("src", src);
            window.insert(document.body(), script.into());
        }
        for src in &self.image_assignments {
            let image = window.new_image();
            window.set_image_src(&image, src);
        }

        window.complete_load();
    }

    fn request(&self, window: &Window, url: &str, is_async: bool) {
        let xhr = window.new_xhr();
        let result = xhr
            .open(OpenArgs::new("GET", url).with_async(is_async))
            .and_then(|()| xhr.send(None));
        if let Err(e) = result {
            log::debug!("request to {} failed: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{DEFAULT_IMAGE_WIDTH, LoadState};

    #[test]
    fn test_from_json_defaults() {
        let fixture = PageFixture::from_json(
            r#"{ "url": "https://site.test/", "scripts": ["/a.js"] }"#,
        )
        .unwrap();
        assert_eq!(fixture.scripts, vec!["/a.js".to_string()]);
        assert!(fixture.images.is_empty());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = PageFixture::from_json(r#"{ "frames": [] }"#);
        assert!(matches!(result, Err(ShieldsError::Encoding(_))));
    }

    #[test]
    fn test_build_rejects_relative_url() {
        let fixture = PageFixture {
            url: "/index.html".to_string(),
            ..PageFixture::default()
        };
        assert!(matches!(fixture.build(), Err(ShieldsError::InvalidUrl { .. })));
    }

    #[test]
    fn test_replay_loads_static_elements() {
        let fixture = PageFixture::demo();
        let window = fixture.build().unwrap();
        fixture.replay(&window);

        let document = window.document();
        assert_eq!(document.scripts().len(), 3);
        let images = document.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].natural_width(), DEFAULT_IMAGE_WIDTH);
        assert_eq!(images[1].natural_width(), 0);
        assert_eq!(images[1].load_state(), LoadState::Failed);
        assert_eq!(window.pending_tasks(), 0);
    }
}
