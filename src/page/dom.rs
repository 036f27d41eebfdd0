//! DOM (Document Object Model) for the page runtime
//!
//! Elements are shared, interior-mutable handles so that script-side code,
//! the event loop, and mutation observers can all hold on to the same node.

use super::events::EventTarget;
use super::mutation::ObserverInner;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use url::Url;

/// Unique identifier for DOM nodes
pub type NodeId = u64;

/// Shared handle to an element
pub type ElementRef = Rc<Element>;

/// Fetch state of an element's `src`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested
    Idle,
    /// Fetch queued on the event loop
    Pending,
    /// Fetched (and decoded, for images)
    Loaded,
    /// Fetch failed
    Failed,
}

/// A node in the DOM tree
#[derive(Debug, Clone)]
pub enum Node {
    /// Element node (e.g., <script>)
    Element(ElementRef),
    /// Text node
    Text(String),
}

impl Node {
    /// Create a text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Get element data if this is an element
    pub fn as_element(&self) -> Option<&ElementRef> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }
}

impl From<ElementRef> for Node {
    fn from(element: ElementRef) -> Self {
        Self::Element(element)
    }
}

/// An element node
#[derive(Debug)]
pub struct Element {
    id: NodeId,
    /// Tag name, lowercase (e.g., "img", "script")
    tag_name: String,
    attributes: RefCell<HashMap<String, String>>,
    children: RefCell<Vec<Node>>,
    parent: RefCell<Weak<Element>>,
    natural_width: Cell<u32>,
    load_state: Cell<LoadState>,
    events: EventTarget,
}

impl Element {
    fn new(id: NodeId, tag_name: &str) -> ElementRef {
        Rc::new(Self {
            id,
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: RefCell::new(HashMap::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            natural_width: Cell::new(0),
            load_state: Cell::new(LoadState::Idle),
            events: EventTarget::new(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Check the tag name, ignoring ASCII case
    pub fn is(&self, tag_name: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag_name)
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    /// Set an attribute value
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.borrow_mut().insert(name.into(), value.into());
    }

    /// Snapshot of the child nodes
    pub fn children(&self) -> Vec<Node> {
        self.children.borrow().clone()
    }

    pub fn parent(&self) -> Option<ElementRef> {
        self.parent.borrow().upgrade()
    }

    /// Intrinsic width of a decoded image; zero until a successful load
    pub fn natural_width(&self) -> u32 {
        self.natural_width.get()
    }

    pub fn set_natural_width(&self, width: u32) {
        self.natural_width.set(width);
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state.get()
    }

    pub(crate) fn set_load_state(&self, state: LoadState) {
        self.load_state.set(state);
    }

    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    /// Check whether `self` is a (strict) ancestor of `node`
    pub fn contains(&self, node: &ElementRef) -> bool {
        let mut current = node.parent();
        while let Some(element) = current {
            if element.id == self.id {
                return true;
            }
            current = element.parent();
        }
        false
    }

    fn collect_by_tag(element: &ElementRef, tag_name: &str, out: &mut Vec<ElementRef>) {
        if element.is(tag_name) {
            out.push(Rc::clone(element));
        }
        for child in element.children.borrow().iter() {
            if let Node::Element(child) = child {
                Self::collect_by_tag(child, tag_name, out);
            }
        }
    }
}

/// The DOM document
#[derive(Debug)]
pub struct Document {
    url: RefCell<Url>,
    document_element: ElementRef,
    head: ElementRef,
    body: ElementRef,
    next_node_id: Cell<NodeId>,
    observers: RefCell<Vec<Weak<ObserverInner>>>,
}

impl Document {
    /// Create a document with an empty `<html><head></head><body></body></html>` skeleton
    pub fn new(url: Url) -> Rc<Self> {
        let document_element = Element::new(1, "html");
        let head = Element::new(2, "head");
        let body = Element::new(3, "body");
        for child in [&head, &body] {
            *child.parent.borrow_mut() = Rc::downgrade(&document_element);
            document_element
                .children
                .borrow_mut()
                .push(Node::Element(Rc::clone(child)));
        }

        Rc::new(Self {
            url: RefCell::new(url),
            document_element,
            head,
            body,
            next_node_id: Cell::new(4),
            observers: RefCell::new(Vec::new()),
        })
    }

    /// The document URL (`document.URL` / `location.href`)
    pub fn url(&self) -> Url {
        self.url.borrow().clone()
    }

    /// Change the document URL, as same-document navigation would
    pub fn set_url(&self, url: Url) {
        *self.url.borrow_mut() = url;
    }

    /// Resolve a possibly relative reference against the document URL
    pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
        self.url.borrow().join(reference)
    }

    /// The reflected `src` of an element: its attribute resolved against the
    /// document URL, the raw attribute if it does not resolve, empty if absent
    pub fn resolved_src(&self, element: &Element) -> String {
        match element.get_attribute("src") {
            Some(raw) => self
                .resolve(&raw)
                .map(|url| url.to_string())
                .unwrap_or(raw),
            None => String::new(),
        }
    }

    pub fn document_element(&self) -> &ElementRef {
        &self.document_element
    }

    pub fn head(&self) -> &ElementRef {
        &self.head
    }

    pub fn body(&self) -> &ElementRef {
        &self.body
    }

    /// Create a detached element
    pub fn create_element(&self, tag_name: &str) -> ElementRef {
        let id = self.next_node_id.get();
        self.next_node_id.set(id + 1);
        Element::new(id, tag_name)
    }

    /// Append a node to `parent` and queue a child-list record for every
    /// observer interested in `parent`
    pub fn append_child(&self, parent: &ElementRef, node: Node) {
        if let Node::Element(element) = &node {
            if let Some(previous) = element.parent() {
                previous.children.borrow_mut().retain(|child| match child {
                    Node::Element(existing) => !Rc::ptr_eq(existing, element),
                    Node::Text(_) => true,
                });
            }
            *element.parent.borrow_mut() = Rc::downgrade(parent);
        }
        parent.children.borrow_mut().push(node.clone());
        self.queue_mutation(parent, node);
    }

    /// All `<script>` elements in tree order (`document.scripts`)
    pub fn scripts(&self) -> Vec<ElementRef> {
        self.elements_by_tag_name("script")
    }

    /// All `<img>` elements in tree order (`document.images`)
    pub fn images(&self) -> Vec<ElementRef> {
        self.elements_by_tag_name("img")
    }

    pub fn elements_by_tag_name(&self, tag_name: &str) -> Vec<ElementRef> {
        let mut out = Vec::new();
        Element::collect_by_tag(&self.document_element, tag_name, &mut out);
        out
    }

    pub(crate) fn register_observer(&self, observer: Weak<ObserverInner>) {
        let mut observers = self.observers.borrow_mut();
        observers.retain(|existing| existing.strong_count() > 0);
        if !observers.iter().any(|existing| existing.ptr_eq(&observer)) {
            observers.push(observer);
        }
    }

    fn live_observers(&self) -> Vec<Rc<ObserverInner>> {
        self.observers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn queue_mutation(&self, parent: &ElementRef, node: Node) {
        for observer in self.live_observers() {
            observer.enqueue(parent, &node);
        }
    }

    /// Deliver queued mutation records to their observers' callbacks
    pub fn notify_mutation_observers(&self) {
        for observer in self.live_observers() {
            observer.deliver();
        }
    }
}
