//! Host-side collection of tracker statistics
//!
//! The host application receives reports over the channel and keeps
//! per-page counts for its shields panel.

use crate::channel::{HostMessage, HostReceiver};
use crate::shields::{ResourceReport, ResourceType};
use crate::utils::Result;
use std::collections::HashMap;

/// Blocked resources seen on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    scripts: usize,
    images: usize,
    requests: usize,
    resources: Vec<(String, ResourceType)>,
}

impl PageStats {
    fn record(&mut self, report: &ResourceReport) {
        match report.resource_type() {
            ResourceType::Script => self.scripts += 1,
            ResourceType::Image => self.images += 1,
            ResourceType::XmlHttpRequest => self.requests += 1,
        }
        self.resources
            .push((report.resource_url().to_string(), report.resource_type()));
    }

    /// Count for one resource type
    pub fn count(&self, resource_type: ResourceType) -> usize {
        match resource_type {
            ResourceType::Script => self.scripts,
            ResourceType::Image => self.images,
            ResourceType::XmlHttpRequest => self.requests,
        }
    }

    pub fn total(&self) -> usize {
        self.resources.len()
    }

    /// Reported resources in arrival order
    pub fn resources(&self) -> &[(String, ResourceType)] {
        &self.resources
    }
}

/// Collects reports posted to one handler, grouped by source page
#[derive(Debug)]
pub struct StatsCollector {
    handler: String,
    pages: HashMap<String, PageStats>,
}

impl StatsCollector {
    /// Create a collector listening for `handler`
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            pages: HashMap::new(),
        }
    }

    pub fn record(&mut self, report: &ResourceReport) {
        self.pages
            .entry(report.source_url().to_string())
            .or_default()
            .record(report);
    }

    /// Record one channel message. Messages for other handlers are ignored.
    pub fn handle(&mut self, message: &HostMessage) -> Result<()> {
        if message.handler != self.handler {
            log::trace!("ignoring message for handler {}", message.handler);
            return Ok(());
        }
        let message = message.decode()?;
        self.record(&message.data);
        Ok(())
    }

    /// Record every message already waiting, returning how many were taken
    pub fn drain(&mut self, receiver: &mut HostReceiver) -> usize {
        let mut taken = 0;
        while let Some(message) = receiver.try_recv() {
            self.handle_logged(&message);
            taken += 1;
        }
        taken
    }

    /// Record messages until every sender has been dropped
    pub async fn run(mut self, mut receiver: HostReceiver) -> Self {
        while let Some(message) = receiver.recv().await {
            self.handle_logged(&message);
        }
        log::debug!("host channel closed after {} reports", self.total());
        self
    }

    fn handle_logged(&mut self, message: &HostMessage) {
        if let Err(e) = self.handle(message) {
            log::warn!("discarding malformed {} message: {}", message.handler, e);
        }
    }

    pub fn page(&self, source_url: &str) -> Option<&PageStats> {
        self.pages.get(source_url)
    }

    pub fn pages(&self) -> impl Iterator<Item = (&str, &PageStats)> {
        self.pages.iter().map(|(url, stats)| (url.as_str(), stats))
    }

    /// Reports recorded across all pages
    pub fn total(&self) -> usize {
        self.pages.values().map(PageStats::total).sum()
    }
}
