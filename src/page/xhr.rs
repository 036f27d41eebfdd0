//! XMLHttpRequest for the page runtime
//!
//! `open` and `send` live on a shared prototype as replaceable function
//! handles; every instance dispatches through whatever the prototype holds at
//! call time.

use super::Window;
use super::events::{EventKind, EventTarget};
use super::loader::LoadOutcome;
use crate::utils::DomException;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use url::Url;

/// Shared handle to a request instance
pub type XhrRef = Rc<XmlHttpRequest>;

/// `XMLHttpRequest.prototype.open`
pub type OpenFn = Rc<dyn Fn(&XhrRef, &OpenArgs) -> Result<(), DomException>>;

/// `XMLHttpRequest.prototype.send`
pub type SendFn = Rc<dyn Fn(&XhrRef, Option<&str>) -> Result<(), DomException>>;

/// Request readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Unsent,
    Opened,
    Done,
}

/// Arguments to `open(method, url, async?)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenArgs {
    pub method: String,
    pub url: String,
    /// `None` when the page omitted the argument
    pub is_async: Option<bool>,
}

impl OpenArgs {
    /// `open(method, url)` with the async flag omitted
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            is_async: None,
        }
    }

    /// Pass the async flag explicitly
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }
}

#[derive(Debug)]
struct RequestState {
    method: String,
    url: Option<Url>,
    is_async: bool,
    ready_state: ReadyState,
    in_flight: bool,
    status: u16,
}

/// A request instance
pub struct XmlHttpRequest {
    id: u64,
    prototype: Rc<XhrPrototype>,
    state: RefCell<RequestState>,
    events: EventTarget,
}

impl XmlHttpRequest {
    pub(crate) fn new(id: u64, prototype: Rc<XhrPrototype>) -> XhrRef {
        Rc::new(Self {
            id,
            prototype,
            state: RefCell::new(RequestState {
                method: String::new(),
                url: None,
                is_async: true,
                ready_state: ReadyState::Unsent,
                in_flight: false,
                status: 0,
            }),
            events: EventTarget::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }

    /// HTTP status, 0 for network errors or requests not yet done
    pub fn status(&self) -> u16 {
        self.state.borrow().status
    }

    pub fn method(&self) -> String {
        self.state.borrow().method.clone()
    }

    /// Call `open` through the prototype
    pub fn open(self: &Rc<Self>, args: OpenArgs) -> Result<(), DomException> {
        let open = self.prototype.open();
        open(self, &args)
    }

    /// Call `send` through the prototype
    pub fn send(self: &Rc<Self>, body: Option<&str>) -> Result<(), DomException> {
        let send = self.prototype.send();
        send(self, body)
    }

    fn finish(&self, outcome: LoadOutcome) {
        {
            let mut state = self.state.borrow_mut();
            state.ready_state = ReadyState::Done;
            state.in_flight = false;
            state.status = match outcome {
                LoadOutcome::Loaded { .. } => 200,
                LoadOutcome::Failed => 0,
            };
        }
        match outcome {
            LoadOutcome::Loaded { .. } => self.events.dispatch(EventKind::Load),
            LoadOutcome::Failed => self.events.dispatch(EventKind::Error),
        };
    }
}

impl fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlHttpRequest")
            .field("id", &self.id)
            .field("state", &self.state.borrow())
            .finish()
    }
}

/// `XMLHttpRequest.prototype`, holding the current `open`/`send` bindings
pub struct XhrPrototype {
    open: RefCell<OpenFn>,
    send: RefCell<SendFn>,
}

impl XhrPrototype {
    pub fn new(open: OpenFn, send: SendFn) -> Self {
        Self {
            open: RefCell::new(open),
            send: RefCell::new(send),
        }
    }

    /// Current `open` binding
    pub fn open(&self) -> OpenFn {
        Rc::clone(&self.open.borrow())
    }

    /// Current `send` binding
    pub fn send(&self) -> SendFn {
        Rc::clone(&self.send.borrow())
    }

    /// Replace `open`, returning the previous binding
    pub fn set_open(&self, open: OpenFn) -> OpenFn {
        self.open.replace(open)
    }

    /// Replace `send`, returning the previous binding
    pub fn set_send(&self, send: SendFn) -> SendFn {
        self.send.replace(send)
    }
}

impl fmt::Debug for XhrPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XhrPrototype").finish_non_exhaustive()
    }
}

fn is_method_token(method: &str) -> bool {
    !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn window_gone() -> DomException {
    DomException::InvalidState("the owning window has been closed".into())
}

/// The engine's own `open`
pub(crate) fn native_open(window: Weak<Window>) -> OpenFn {
    Rc::new(
        move |xhr: &XhrRef, args: &OpenArgs| -> Result<(), DomException> {
            let window = window.upgrade().ok_or_else(window_gone)?;
            if !is_method_token(&args.method) {
                return Err(DomException::Syntax(format!(
                    "'{}' is not a valid HTTP method",
                    args.method
                )));
            }
            let url = window
                .document()
                .resolve(&args.url)
                .map_err(|e| DomException::Syntax(format!("invalid URL '{}': {}", args.url, e)))?;

            let mut state = xhr.state.borrow_mut();
            state.method = args.method.to_ascii_uppercase();
            state.url = Some(url);
            state.is_async = args.is_async.unwrap_or(true);
            state.ready_state = ReadyState::Opened;
            state.in_flight = false;
            state.status = 0;
            Ok(())
        },
    )
}

/// The engine's own `send`
pub(crate) fn native_send(window: Weak<Window>) -> SendFn {
    Rc::new(
        move |xhr: &XhrRef, _body: Option<&str>| -> Result<(), DomException> {
            let window = window.upgrade().ok_or_else(window_gone)?;
            let (url, is_async) = {
                let mut state = xhr.state.borrow_mut();
                if state.ready_state != ReadyState::Opened || state.in_flight {
                    return Err(DomException::InvalidState(
                        "send() requires an opened, idle request".into(),
                    ));
                }
                let url = state
                    .url
                    .clone()
                    .ok_or_else(|| DomException::InvalidState("request has no URL".into()))?;
                state.in_flight = true;
                (url, state.is_async)
            };

            let loader = window.loader();
            if is_async {
                let weak = Rc::downgrade(xhr);
                window.queue_task(Box::new(move || {
                    if let Some(xhr) = weak.upgrade() {
                        xhr.finish(loader.fetch(&url));
                    }
                }));
                return Ok(());
            }

            let outcome = loader.fetch(&url);
            xhr.finish(outcome);
            match outcome {
                LoadOutcome::Loaded { .. } => Ok(()),
                LoadOutcome::Failed => Err(DomException::Network(url.to_string())),
            }
        },
    )
}
