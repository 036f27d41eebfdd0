//! `Image.prototype.src` interception

use super::report::{Reporter, ResourceType};
use crate::page::{
    AccessorDescriptor, Element, ElementRef, EventKind, ImagePrototype, Listener, ListenerId,
    NodeId, SrcGetter, SrcSetter,
};
use crate::utils::{Result, ShieldsError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Images that already carry a failure listener, keyed by node id.
///
/// Entries live as long as their image, across enable cycles.
#[derive(Default)]
pub(crate) struct ImageTracking {
    listeners: RefCell<HashMap<NodeId, (Weak<Element>, ListenerId)>>,
}

impl ImageTracking {
    fn is_tracked(&self, image: &Element) -> bool {
        self.listeners.borrow().contains_key(&image.id())
    }

    fn track(&self, image: &ElementRef, listener: ListenerId) {
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|_, (element, _)| element.strong_count() > 0);
        listeners.insert(image.id(), (Rc::downgrade(image), listener));
    }

    /// Live images carrying a failure listener
    pub(crate) fn len(&self) -> usize {
        self.listeners
            .borrow()
            .values()
            .filter(|(element, _)| element.strong_count() > 0)
            .count()
    }
}

fn failure_listener(image: &ElementRef, get: SrcGetter, reporter: Reporter) -> Listener {
    let image = Rc::downgrade(image);
    Rc::new(move || {
        if let Some(image) = image.upgrade() {
            // Read at failure time: the getter yields the resolved URL
            reporter.report(&get(&image), ResourceType::Image);
        }
    })
}

/// Redefine `src` on the prototype with an accessor wrapping `original`
pub(crate) fn install(
    prototype: &ImagePrototype,
    original: &AccessorDescriptor,
    tracking: &Rc<ImageTracking>,
    reporter: Reporter,
) -> Result<()> {
    let original_get = Rc::clone(&original.get);
    let get: SrcGetter = Rc::new(move |image: &ElementRef| -> String { original_get(image) });

    let listener_get = Rc::clone(&original.get);
    let original_set = Rc::clone(&original.set);
    let set_tracking = Rc::clone(tracking);
    let set: SrcSetter = Rc::new(move |image: &ElementRef, value: &str| {
        if !set_tracking.is_tracked(image) {
            let listener = failure_listener(image, Rc::clone(&listener_get), reporter.clone());
            let id = image.events().add_event_listener(EventKind::Error, listener);
            set_tracking.track(image, id);
        }
        original_set(image, value);
    });

    if !prototype.delete_src() {
        return Err(ShieldsError::LockedBinding("Image.prototype.src"));
    }
    prototype
        .define_src(AccessorDescriptor {
            get,
            set,
            enumerable: true,
            configurable: true,
        })
        .map_err(|_| ShieldsError::LockedBinding("Image.prototype.src"))
}
