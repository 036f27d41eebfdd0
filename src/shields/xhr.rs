//! Synchronous XMLHttpRequest failure reporting
//!
//! Asynchronous requests are left alone; only requests opened with an
//! explicit `async = false` are tracked.

use super::report::{Reporter, ResourceType};
use crate::page::{
    EventKind, Listener, ListenerId, OpenArgs, OpenFn, SendFn, XhrPrototype, XhrRef,
    XmlHttpRequest,
};
use crate::utils::DomException;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Whether an `open` call asks for a tracked (explicitly synchronous) request
pub(crate) fn should_track(is_async: Option<bool>) -> bool {
    is_async == Some(false)
}

struct TrackedRequest {
    request: Weak<XmlHttpRequest>,
    should_track: bool,
    url: String,
    error_listener: Option<ListenerId>,
}

/// Per-request tracking state, keyed by instance id.
///
/// Entries live as long as their request, across enable cycles.
#[derive(Default)]
pub(crate) struct XhrTracking {
    requests: RefCell<HashMap<u64, TrackedRequest>>,
}

impl XhrTracking {
    fn record_open(&self, xhr: &XhrRef, args: &OpenArgs) {
        let mut requests = self.requests.borrow_mut();
        requests.retain(|_, entry| entry.request.strong_count() > 0);

        let entry = requests.entry(xhr.id()).or_insert_with(|| TrackedRequest {
            request: Rc::downgrade(xhr),
            should_track: false,
            url: String::new(),
            error_listener: None,
        });
        entry.should_track = should_track(args.is_async);
        entry.url = args.url.clone();
    }

    fn needs_listener(&self, id: u64) -> bool {
        self.requests
            .borrow()
            .get(&id)
            .is_some_and(|entry| entry.should_track && entry.error_listener.is_none())
    }

    fn set_listener(&self, id: u64, listener: ListenerId) {
        if let Some(entry) = self.requests.borrow_mut().get_mut(&id) {
            entry.error_listener = Some(listener);
        }
    }

    /// URL to report for a failed request, if it is currently tracked
    fn tracked_url(&self, id: u64) -> Option<String> {
        self.requests
            .borrow()
            .get(&id)
            .filter(|entry| entry.should_track)
            .map(|entry| entry.url.clone())
    }

    /// Live requests that have been opened while the shim was installed
    pub(crate) fn len(&self) -> usize {
        self.requests
            .borrow()
            .values()
            .filter(|entry| entry.request.strong_count() > 0)
            .count()
    }
}

fn error_listener(id: u64, tracking: &Rc<XhrTracking>, reporter: Reporter) -> Listener {
    let tracking = Rc::downgrade(tracking);
    Rc::new(move || {
        let url = tracking.upgrade().and_then(|tracking| tracking.tracked_url(id));
        if let Some(url) = url {
            reporter.report(&url, ResourceType::XmlHttpRequest);
        }
    })
}

/// Replace `open` and `send` on the prototype with wrappers delegating to the
/// given originals and recording into `tracking`
pub(crate) fn install(
    prototype: &XhrPrototype,
    original_open: OpenFn,
    original_send: SendFn,
    tracking: &Rc<XhrTracking>,
    reporter: Reporter,
) {
    let open_tracking = Rc::clone(tracking);
    prototype.set_open(Rc::new(
        move |xhr: &XhrRef, args: &OpenArgs| -> Result<(), DomException> {
            open_tracking.record_open(xhr, args);
            original_open(xhr, args)
        },
    ));

    let send_tracking = Rc::clone(tracking);
    prototype.set_send(Rc::new(
        move |xhr: &XhrRef, body: Option<&str>| -> Result<(), DomException> {
            if send_tracking.needs_listener(xhr.id()) {
                let listener = error_listener(xhr.id(), &send_tracking, reporter.clone());
                let id = xhr.events().add_event_listener(EventKind::Error, listener);
                send_tracking.set_listener(xhr.id(), id);
            }
            original_send(xhr, body)
        },
    ));
}
