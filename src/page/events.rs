//! Event targets and listener registration

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Events the page runtime dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Resource or document finished loading
    Load,
    /// Resource failed to load
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Load => "load",
            EventKind::Error => "error",
        }
    }
}

/// Handle returned by `add_event_listener`, used to remove the listener again
pub type ListenerId = u64;

/// Event listener callback
pub type Listener = Rc<dyn Fn()>;

/// Anything that can have event listeners attached (window, elements, XHRs)
#[derive(Default)]
pub struct EventTarget {
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
    next_id: Cell<ListenerId>,
}

impl EventTarget {
    /// Create an event target with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its id
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    /// Remove a listener by id. Returns false if it was not registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of listeners registered for an event kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Fire an event, returning how many listeners ran.
    ///
    /// Listeners are snapshotted first, so a listener may add or remove
    /// listeners on this target while the event is being dispatched.
    pub fn dispatch(&self, kind: EventKind) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener();
        }
        snapshot.len()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("load_listeners", &self.listener_count(EventKind::Load))
            .field("error_listeners", &self.listener_count(EventKind::Error))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_runs_matching_listeners() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));

        let loaded = Rc::new(Cell::new(false));

        let counter = Rc::clone(&hits);
        target.add_event_listener(
            EventKind::Error,
            Rc::new(move || counter.set(counter.get() + 1)),
        );
        let flag = Rc::clone(&loaded);
        target.add_event_listener(EventKind::Load, Rc::new(move || flag.set(true)));

        assert_eq!(target.dispatch(EventKind::Error), 1);
        assert_eq!(hits.get(), 1);
        assert!(!loaded.get());
    }

    #[test]
    fn test_remove_listener() {
        let target = EventTarget::new();
        let id = target.add_event_listener(EventKind::Load, Rc::new(|| {}));
        assert_eq!(target.listener_count(EventKind::Load), 1);
        assert!(target.remove_event_listener(id));
        assert!(!target.remove_event_listener(id));
        assert_eq!(target.dispatch(EventKind::Load), 0);
    }

    #[test]
    fn test_listener_may_remove_itself() {
        let target = Rc::new(EventTarget::new());
        let id = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&target);
        let own_id = Rc::clone(&id);
        let registered = target.add_event_listener(
            EventKind::Error,
            Rc::new(move || {
                if let Some(target) = weak.upgrade() {
                    target.remove_event_listener(own_id.get());
                }
            }),
        );
        id.set(registered);

        assert_eq!(target.dispatch(EventKind::Error), 1);
        assert_eq!(target.listener_count(EventKind::Error), 0);
    }
}
