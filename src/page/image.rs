//! `Image.prototype.src` accessor

use super::Window;
use super::dom::ElementRef;
use crate::utils::DomException;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Accessor getter, called with the receiving element
pub type SrcGetter = Rc<dyn Fn(&ElementRef) -> String>;

/// Accessor setter, called with the receiving element and the assigned value
pub type SrcSetter = Rc<dyn Fn(&ElementRef, &str)>;

/// Property descriptor for an accessor property
#[derive(Clone)]
pub struct AccessorDescriptor {
    pub get: SrcGetter,
    pub set: SrcSetter,
    pub enumerable: bool,
    pub configurable: bool,
}

impl AccessorDescriptor {
    /// Reference identity: same getter, same setter, same attributes
    pub fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.get, &other.get)
            && Rc::ptr_eq(&self.set, &other.set)
            && self.enumerable == other.enumerable
            && self.configurable == other.configurable
    }
}

impl fmt::Debug for AccessorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorDescriptor")
            .field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish_non_exhaustive()
    }
}

/// `Image.prototype`, holding the `src` property if defined
#[derive(Debug, Default)]
pub struct ImagePrototype {
    src: RefCell<Option<AccessorDescriptor>>,
}

impl ImagePrototype {
    pub fn new(src: AccessorDescriptor) -> Self {
        Self {
            src: RefCell::new(Some(src)),
        }
    }

    /// `Object.getOwnPropertyDescriptor(Image.prototype, "src")`
    pub fn src_descriptor(&self) -> Option<AccessorDescriptor> {
        self.src.borrow().clone()
    }

    /// `Object.defineProperty(Image.prototype, "src", descriptor)`
    pub fn define_src(&self, descriptor: AccessorDescriptor) -> Result<(), DomException> {
        let mut src = self.src.borrow_mut();
        if let Some(existing) = src.as_ref() {
            if !existing.configurable && !existing.is_same(&descriptor) {
                return Err(DomException::Type("cannot redefine property: src".into()));
            }
        }
        *src = Some(descriptor);
        Ok(())
    }

    /// `delete Image.prototype.src`; false when the property is not configurable
    pub fn delete_src(&self) -> bool {
        let mut src = self.src.borrow_mut();
        match src.as_ref() {
            Some(existing) if !existing.configurable => false,
            _ => {
                src.take();
                true
            }
        }
    }
}

/// The engine's own accessor: the getter reflects the resolved URL, the setter
/// stores the attribute and starts a fetch
pub(crate) fn native_src_descriptor(window: Weak<Window>) -> AccessorDescriptor {
    let getter_window = window.clone();
    AccessorDescriptor {
        get: Rc::new(move |image: &ElementRef| -> String {
            getter_window
                .upgrade()
                .map(|window| window.document().resolved_src(image))
                .unwrap_or_else(|| image.get_attribute("src").unwrap_or_default())
        }),
        set: Rc::new(move |image: &ElementRef, value: &str| {
            image.set_attribute("src", value);
            if let Some(window) = window.upgrade() {
                window.request_load(image);
            }
        }),
        enumerable: true,
        configurable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{BlockListLoader, EventKind, LoadState};
    use std::cell::Cell;

    fn window() -> Rc<Window> {
        let loader = BlockListLoader::new().block_host("ads.test").with_image_width(10);
        Window::open("https://site.test/gallery/", Rc::new(loader)).unwrap()
    }

    #[test]
    fn test_setter_loads_image() {
        let window = window();
        let img = window.new_image();
        window.set_image_src(&img, "cat.png");
        assert_eq!(img.load_state(), LoadState::Pending);
        assert_eq!(window.image_src(&img), "https://site.test/gallery/cat.png");

        window.run_until_idle();
        assert_eq!(img.load_state(), LoadState::Loaded);
        assert_eq!(img.natural_width(), 10);
    }

    #[test]
    fn test_blocked_image_fires_error() {
        let window = window();
        let img = window.new_image();
        let errors = Rc::new(Cell::new(0));
        let counter = Rc::clone(&errors);
        img.events()
            .add_event_listener(EventKind::Error, Rc::new(move || counter.set(counter.get() + 1)));

        window.set_image_src(&img, "https://ads.test/banner.gif");
        window.run_until_idle();
        assert_eq!(errors.get(), 1);
        assert_eq!(img.natural_width(), 0);
        assert_eq!(img.load_state(), LoadState::Failed);
    }

    #[test]
    fn test_define_and_delete() {
        let window = window();
        let proto = window.image_prototype();
        let original = proto.src_descriptor().unwrap();
        assert!(original.enumerable && original.configurable);

        assert!(proto.delete_src());
        assert!(proto.src_descriptor().is_none());

        let locked = AccessorDescriptor {
            configurable: false,
            ..original.clone()
        };
        proto.define_src(locked).unwrap();
        assert!(!proto.delete_src());
        assert!(matches!(
            proto.define_src(original),
            Err(DomException::Type(_))
        ));
    }
}
