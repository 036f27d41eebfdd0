//! Resource reports and the emitter that sends them to the host

use crate::channel::ChannelAdapter;
use crate::page::Document;
use crate::utils::{Result, ShieldsError};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use url::Url;

/// Kind of resource a report is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Script,
    Image,
    XmlHttpRequest,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::XmlHttpRequest => "xmlhttprequest",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed resource load, with absolute URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    #[serde(rename = "resourceURL")]
    resource_url: String,
    #[serde(rename = "sourceURL")]
    source_url: String,
    #[serde(rename = "resourceType")]
    resource_type: ResourceType,
}

impl ResourceReport {
    /// Build a report, resolving `resource_url` against the page URL
    pub fn resolve(
        resource_url: &str,
        source_url: &str,
        resource_type: ResourceType,
    ) -> Result<Self> {
        let source =
            Url::parse(source_url).map_err(|e| ShieldsError::invalid_url(source_url, e))?;
        let resource = source
            .join(resource_url)
            .map_err(|e| ShieldsError::invalid_url(resource_url, e))?;

        Ok(Self {
            resource_url: resource.into(),
            source_url: source.into(),
            resource_type,
        })
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }
}

/// Builds reports and hands them to the channel
#[derive(Debug)]
pub struct ReportEmitter {
    channel: ChannelAdapter,
    emitted: Cell<usize>,
}

impl ReportEmitter {
    pub fn new(channel: ChannelAdapter) -> Self {
        Self {
            channel,
            emitted: Cell::new(0),
        }
    }

    /// Send one report. Empty and malformed URLs are dropped (malformed ones
    /// are logged); the return value says whether anything was sent.
    pub fn emit(&self, resource_url: &str, source_url: &str, resource_type: ResourceType) -> bool {
        if resource_url.is_empty() {
            return false;
        }
        match ResourceReport::resolve(resource_url, source_url, resource_type) {
            Ok(report) => {
                log::debug!("{} report for {}", resource_type, report.resource_url());
                self.channel.post(report);
                self.emitted.set(self.emitted.get() + 1);
                true
            }
            Err(e) => {
                log::error!("dropping {} report: {}", resource_type, e);
                false
            }
        }
    }

    /// Number of reports sent so far
    pub fn emitted(&self) -> usize {
        self.emitted.get()
    }
}

/// Emitter bound to a page; reads the page URL fresh for every report
#[derive(Clone)]
pub(crate) struct Reporter {
    emitter: Rc<ReportEmitter>,
    document: Weak<Document>,
}

impl Reporter {
    pub(crate) fn new(emitter: Rc<ReportEmitter>, document: &Rc<Document>) -> Self {
        Self {
            emitter,
            document: Rc::downgrade(document),
        }
    }

    pub(crate) fn document(&self) -> Option<Rc<Document>> {
        self.document.upgrade()
    }

    pub(crate) fn report(&self, resource_url: &str, resource_type: ResourceType) {
        if let Some(document) = self.document() {
            self.emitter
                .emit(resource_url, document.url().as_str(), resource_type);
        }
    }
}
