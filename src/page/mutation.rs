//! Mutation observers
//!
//! Records are queued when the tree changes and delivered in a batch when the
//! window runs its microtask checkpoint, the same shape the DOM exposes.

use super::dom::{Document, Element, ElementRef, Node};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Which mutations an observer wants to see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverOptions {
    /// Report nodes added to the target
    pub child_list: bool,
    /// Extend observation to all descendants of the target
    pub subtree: bool,
}

impl ObserverOptions {
    /// `{ childList: true, subtree: true }`
    pub fn subtree_child_list() -> Self {
        Self {
            child_list: true,
            subtree: true,
        }
    }
}

/// A single child-list change
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Element whose children changed
    pub target: ElementRef,
    /// Nodes appended to `target`
    pub added_nodes: Vec<Node>,
}

/// Observer callback, invoked with every record queued since the last delivery
pub type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;

pub(crate) struct ObserverInner {
    callback: MutationCallback,
    registration: RefCell<Option<(Weak<Element>, ObserverOptions)>>,
    records: RefCell<Vec<MutationRecord>>,
}

impl ObserverInner {
    pub(crate) fn enqueue(&self, parent: &ElementRef, node: &Node) {
        let interested = match &*self.registration.borrow() {
            Some((target, options)) if options.child_list => match target.upgrade() {
                Some(target) => {
                    Rc::ptr_eq(&target, parent) || (options.subtree && target.contains(parent))
                }
                None => false,
            },
            _ => false,
        };

        if interested {
            self.records.borrow_mut().push(MutationRecord {
                target: Rc::clone(parent),
                added_nodes: vec![node.clone()],
            });
        }
    }

    pub(crate) fn deliver(&self) {
        let records = std::mem::take(&mut *self.records.borrow_mut());
        if !records.is_empty() {
            (self.callback)(&records);
        }
    }
}

/// DOM mutation observer
pub struct MutationObserver {
    inner: Rc<ObserverInner>,
}

impl MutationObserver {
    /// Create an observer that is not yet observing anything
    pub fn new(callback: MutationCallback) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                callback,
                registration: RefCell::new(None),
                records: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Start observing `target` in `document`
    pub fn observe(&self, document: &Document, target: &ElementRef, options: ObserverOptions) {
        *self.inner.registration.borrow_mut() = Some((Rc::downgrade(target), options));
        document.register_observer(Rc::downgrade(&self.inner));
    }

    /// Stop observing and drop any records not yet delivered
    pub fn disconnect(&self) {
        self.inner.registration.borrow_mut().take();
        self.inner.records.borrow_mut().clear();
    }

    /// Take the pending records without invoking the callback
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.inner.records.borrow_mut())
    }

    pub fn is_observing(&self) -> bool {
        self.inner.registration.borrow().is_some()
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("observing", &self.is_observing())
            .field("pending_records", &self.inner.records.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use url::Url;

    fn document() -> Rc<Document> {
        Document::new(Url::parse("https://site.test/").unwrap())
    }

    fn counting_observer() -> (MutationObserver, Rc<Cell<usize>>) {
        let added = Rc::new(Cell::new(0));
        let counter = Rc::clone(&added);
        let observer = MutationObserver::new(Rc::new(move |records: &[MutationRecord]| {
            let count: usize = records.iter().map(|r| r.added_nodes.len()).sum();
            counter.set(counter.get() + count);
        }));
        (observer, added)
    }

    #[test]
    fn test_subtree_observation() {
        let doc = document();
        let (observer, added) = counting_observer();
        observer.observe(&doc, doc.document_element(), ObserverOptions::subtree_child_list());

        let div = doc.create_element("div");
        doc.append_child(doc.body(), div.clone().into());
        doc.append_child(&div, Node::text("hi"));
        assert_eq!(added.get(), 0, "delivery waits for the checkpoint");

        doc.notify_mutation_observers();
        assert_eq!(added.get(), 2);
    }

    #[test]
    fn test_without_subtree_only_direct_children() {
        let doc = document();
        let (observer, added) = counting_observer();
        observer.observe(
            &doc,
            doc.document_element(),
            ObserverOptions {
                child_list: true,
                subtree: false,
            },
        );

        doc.append_child(doc.body(), doc.create_element("p").into());
        doc.notify_mutation_observers();
        assert_eq!(added.get(), 0);
    }

    #[test]
    fn test_disconnect_discards_pending_records() {
        let doc = document();
        let (observer, added) = counting_observer();
        observer.observe(&doc, doc.document_element(), ObserverOptions::subtree_child_list());

        doc.append_child(doc.body(), doc.create_element("script").into());
        observer.disconnect();
        doc.append_child(doc.body(), doc.create_element("script").into());
        doc.notify_mutation_observers();

        assert_eq!(added.get(), 0);
        assert!(!observer.is_observing());
    }

    #[test]
    fn test_take_records() {
        let doc = document();
        let (observer, added) = counting_observer();
        observer.observe(&doc, doc.document_element(), ObserverOptions::subtree_child_list());
        doc.append_child(doc.head(), doc.create_element("script").into());

        assert_eq!(observer.take_records().len(), 1);
        doc.notify_mutation_observers();
        assert_eq!(added.get(), 0);
    }
}
