//! Tracker blocking statistics
//!
//! Observes which resource loads on a page fail and reports each one to the
//! host. Nothing here blocks anything: blocking happens in the network layer
//! and is inferred from the failure signals the page can see.
//!
//! - XHR: synchronous requests that fire `error`
//! - Image: instances whose `src` load fires `error`
//! - Mutation watcher: every `<script src>` inserted into the document
//! - Load scanner: every `<script src>` and zero-width `<img>` at `load`

mod config;
mod image;
mod report;
mod scanner;
mod watcher;
mod xhr;

pub use config::ShieldsConfig;
pub use report::{ReportEmitter, ResourceReport, ResourceType};

use crate::channel::{ChannelAdapter, MessageSink, SecurityToken};
use crate::page::{
    AccessorDescriptor, EventKind, ListenerId, MutationObserver, ObserverOptions, OpenFn, SendFn,
    Window,
};
use crate::utils::{Result, ShieldsError};
use image::ImageTracking;
use report::Reporter;
use std::cell::RefCell;
use std::rc::Rc;
use xhr::XhrTracking;

/// Everything owned while the shim is installed
struct InterceptionState {
    original_open: OpenFn,
    original_send: SendFn,
    original_image_src: AccessorDescriptor,
    observer: MutationObserver,
    load_listener: ListenerId,
}

/// Lifecycle controller: the only code that touches the page prototypes
pub struct TrackingProtectionStats {
    window: Rc<Window>,
    emitter: Rc<ReportEmitter>,
    config: ShieldsConfig,
    state: RefCell<Option<InterceptionState>>,
    // Per-instance tracking outlives any one enable cycle
    xhr_tracking: Rc<XhrTracking>,
    image_tracking: Rc<ImageTracking>,
}

impl TrackingProtectionStats {
    /// Create a disabled instance for `window`, posting to `sink`
    pub fn new(
        window: Rc<Window>,
        sink: Rc<dyn MessageSink>,
        token: SecurityToken,
        config: ShieldsConfig,
    ) -> Self {
        let channel = ChannelAdapter::new(config.message_handler.clone(), token, sink);
        Self {
            window,
            emitter: Rc::new(ReportEmitter::new(channel)),
            config,
            state: RefCell::new(None),
            xhr_tracking: Rc::new(XhrTracking::default()),
            image_tracking: Rc::new(ImageTracking::default()),
        }
    }

    /// Install or uninstall all interceptors. Both directions are idempotent.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            if self.is_enabled() {
                return Ok(());
            }
            let state = self.install()?;
            *self.state.borrow_mut() = Some(state);
            log::debug!("tracker statistics enabled for {}", self.window.location());
        } else {
            let state = self.state.borrow_mut().take();
            if let Some(state) = state {
                self.uninstall(state);
                log::debug!("tracker statistics disabled for {}", self.window.location());
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Reports sent since creation, across enable cycles
    pub fn reports_emitted(&self) -> usize {
        self.emitter.emitted()
    }

    /// Live instances the shim has seen: (opened requests, images with a
    /// failure listener)
    pub fn tracked_instances(&self) -> (usize, usize) {
        (self.xhr_tracking.len(), self.image_tracking.len())
    }

    pub fn window(&self) -> &Rc<Window> {
        &self.window
    }

    fn install(&self) -> Result<InterceptionState> {
        let window = &self.window;
        let document = window.document();

        // Check everything that can fail before touching the page
        let original_image_src = window
            .image_prototype()
            .src_descriptor()
            .ok_or(ShieldsError::MissingBinding("Image.prototype.src"))?;
        if !original_image_src.configurable {
            return Err(ShieldsError::LockedBinding("Image.prototype.src"));
        }

        let reporter = Reporter::new(Rc::clone(&self.emitter), document);
        image::install(
            window.image_prototype(),
            &original_image_src,
            &self.image_tracking,
            reporter.clone(),
        )?;

        let original_open = window.xhr_prototype().open();
        let original_send = window.xhr_prototype().send();
        xhr::install(
            window.xhr_prototype(),
            Rc::clone(&original_open),
            Rc::clone(&original_send),
            &self.xhr_tracking,
            reporter.clone(),
        );

        let observer = watcher::script_watcher(reporter.clone());
        observer.observe(
            document,
            document.document_element(),
            ObserverOptions::subtree_child_list(),
        );

        let load_listener = window.events().add_event_listener(
            EventKind::Load,
            scanner::load_listener(reporter, self.config.report_unrendered_images),
        );

        Ok(InterceptionState {
            original_open,
            original_send,
            original_image_src,
            observer,
            load_listener,
        })
    }

    fn uninstall(&self, state: InterceptionState) {
        let window = &self.window;
        window.events().remove_event_listener(state.load_listener);
        state.observer.disconnect();

        window.xhr_prototype().set_open(state.original_open);
        window.xhr_prototype().set_send(state.original_send);

        let prototype = window.image_prototype();
        prototype.delete_src();
        if let Err(e) = prototype.define_src(state.original_image_src) {
            log::error!("failed to restore Image.prototype.src: {}", e);
        }
    }
}

impl Drop for TrackingProtectionStats {
    fn drop(&mut self) {
        if let Some(state) = self.state.get_mut().take() {
            self.uninstall(state);
        }
    }
}
