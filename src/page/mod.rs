//! Page runtime
//!
//! A single-threaded model of the pieces of a browsing context the shields
//! need to see:
//! - Window: event loop, `load` event, prototypes, network seam
//! - Document: element tree, `document.scripts` / `document.images`
//! - Mutation observers with microtask-style delivery
//! - `XMLHttpRequest` and `Image` with replaceable prototype bindings
//!
//! A JavaScript engine binding drives this runtime; nothing in it knows about
//! tracker statistics.

mod dom;
mod events;
pub mod fixture;
mod image;
mod loader;
mod mutation;
mod xhr;

pub use dom::{Document, Element, ElementRef, LoadState, Node, NodeId};
pub use events::{EventKind, EventTarget, Listener, ListenerId};
pub use fixture::PageFixture;
pub use image::{AccessorDescriptor, ImagePrototype, SrcGetter, SrcSetter};
pub use loader::{BlockListLoader, DEFAULT_IMAGE_WIDTH, LoadOutcome, ResourceLoader};
pub use mutation::{MutationCallback, MutationObserver, MutationRecord, ObserverOptions};
pub use xhr::{OpenArgs, OpenFn, ReadyState, SendFn, XhrPrototype, XhrRef, XmlHttpRequest};

use crate::utils::{Result, ShieldsError};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use url::Url;

/// A queued event-loop task
pub type Task = Box<dyn FnOnce()>;

/// The window of a single page
pub struct Window {
    document: Rc<Document>,
    xhr_prototype: Rc<XhrPrototype>,
    image_prototype: Rc<ImagePrototype>,
    events: EventTarget,
    tasks: RefCell<VecDeque<Task>>,
    loader: Rc<dyn ResourceLoader>,
    next_instance_id: Cell<u64>,
}

impl Window {
    /// Create a window showing an empty document at `url`
    pub fn new(url: Url, loader: Rc<dyn ResourceLoader>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            document: Document::new(url),
            xhr_prototype: Rc::new(XhrPrototype::new(
                xhr::native_open(weak.clone()),
                xhr::native_send(weak.clone()),
            )),
            image_prototype: Rc::new(ImagePrototype::new(image::native_src_descriptor(
                weak.clone(),
            ))),
            events: EventTarget::new(),
            tasks: RefCell::new(VecDeque::new()),
            loader,
            next_instance_id: Cell::new(1),
        })
    }

    /// Parse `url` and create a window for it
    pub fn open(url: &str, loader: Rc<dyn ResourceLoader>) -> Result<Rc<Self>> {
        let url = Url::parse(url).map_err(|e| ShieldsError::invalid_url(url, e))?;
        Ok(Self::new(url, loader))
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    /// `location.href`
    pub fn location(&self) -> Url {
        self.document.url()
    }

    /// Window-level event target (`load`)
    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    pub fn xhr_prototype(&self) -> &Rc<XhrPrototype> {
        &self.xhr_prototype
    }

    pub fn image_prototype(&self) -> &Rc<ImagePrototype> {
        &self.image_prototype
    }

    pub fn loader(&self) -> Rc<dyn ResourceLoader> {
        Rc::clone(&self.loader)
    }

    /// `new XMLHttpRequest()`
    pub fn new_xhr(&self) -> XhrRef {
        let id = self.next_instance_id.get();
        self.next_instance_id.set(id + 1);
        XmlHttpRequest::new(id, Rc::clone(&self.xhr_prototype))
    }

    /// `new Image()`
    pub fn new_image(&self) -> ElementRef {
        self.document.create_element("img")
    }

    /// Read `image.src` through the prototype accessor
    pub fn image_src(&self, image: &ElementRef) -> String {
        match self.image_prototype.src_descriptor() {
            Some(descriptor) => (descriptor.get)(image),
            None => image.get_attribute("src").unwrap_or_default(),
        }
    }

    /// Assign `image.src` through the prototype accessor.
    ///
    /// Without an accessor the assignment only stores the value, as an own
    /// data property would.
    pub fn set_image_src(&self, image: &ElementRef, value: &str) {
        match self.image_prototype.src_descriptor() {
            Some(descriptor) => (descriptor.set)(image, value),
            None => image.set_attribute("src", value),
        }
    }

    /// Insert a node into the document, starting the fetch of `<img src>` and
    /// `<script src>` elements
    pub fn insert(&self, parent: &ElementRef, node: Node) {
        self.document.append_child(parent, node.clone());
        if let Node::Element(element) = node {
            let fetches = (element.is("img") || element.is("script"))
                && element.get_attribute("src").is_some();
            if fetches {
                self.request_load(&element);
            }
        }
    }

    /// Queue a fetch of the element's `src` on the event loop
    pub(crate) fn request_load(&self, element: &ElementRef) {
        element.set_load_state(LoadState::Pending);
        element.set_natural_width(0);

        let src = element.get_attribute("src").unwrap_or_default();
        let url = self.document.resolve(&src).ok();
        let loader = self.loader();
        let weak = Rc::downgrade(element);
        self.queue_task(Box::new(move || {
            let Some(element) = weak.upgrade() else {
                return;
            };
            // A later assignment superseded this fetch
            if element.get_attribute("src").unwrap_or_default() != src {
                return;
            }
            let outcome = url
                .as_ref()
                .map(|url| loader.fetch(url))
                .unwrap_or(LoadOutcome::Failed);
            match outcome {
                LoadOutcome::Loaded { natural_width } => {
                    if element.is("img") {
                        element.set_natural_width(natural_width);
                    }
                    element.set_load_state(LoadState::Loaded);
                    element.events().dispatch(EventKind::Load);
                }
                LoadOutcome::Failed => {
                    element.set_load_state(LoadState::Failed);
                    element.events().dispatch(EventKind::Error);
                }
            }
        }));
    }

    /// Queue a task on the event loop
    pub fn queue_task(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    /// Number of tasks waiting to run
    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Microtask checkpoint: deliver queued mutation records
    pub fn run_microtasks(&self) {
        self.document.notify_mutation_observers();
    }

    /// Run tasks until the queue is empty, returning how many ran
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            self.run_microtasks();
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Finish loading the page: settle every pending fetch, then fire the
    /// window `load` event
    pub fn complete_load(&self) {
        self.run_until_idle();
        self.events.dispatch(EventKind::Load);
        self.run_until_idle();
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("location", &self.location().as_str())
            .field("pending_tasks", &self.pending_tasks())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Rc<Window> {
        let loader = BlockListLoader::new().block_host("tracker.test");
        Window::open("https://site.test/page", Rc::new(loader)).unwrap()
    }

    #[test]
    fn test_open_rejects_relative_url() {
        let result = Window::open("/relative", Rc::new(BlockListLoader::new()));
        assert!(matches!(result, Err(ShieldsError::InvalidUrl { .. })));
    }

    #[test]
    fn test_insert_script_fetches() {
        let window = window();
        let script = window.document().create_element("script");
        script.set_attribute("src", "https://tracker.test/t.js");
        window.insert(window.document().head(), script.clone().into());
        assert_eq!(window.pending_tasks(), 1);

        assert_eq!(window.run_until_idle(), 1);
        assert_eq!(script.load_state(), LoadState::Failed);
    }

    #[test]
    fn test_inline_script_does_not_fetch() {
        let window = window();
        let script = window.document().create_element("script");
        window.insert(window.document().head(), script.into());
        assert_eq!(window.pending_tasks(), 0);
    }

    #[test]
    fn test_superseded_fetch_is_skipped() {
        let window = window();
        let img = window.new_image();
        window.set_image_src(&img, "https://tracker.test/a.gif");
        window.set_image_src(&img, "/b.png");
        window.run_until_idle();
        assert_eq!(img.load_state(), LoadState::Loaded);
        assert_eq!(img.natural_width(), DEFAULT_IMAGE_WIDTH);
    }

    #[test]
    fn test_complete_load_fires_window_load() {
        let window = window();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        window
            .events()
            .add_event_listener(EventKind::Load, Rc::new(move || flag.set(true)));
        window.complete_load();
        assert!(fired.get());
    }
}
