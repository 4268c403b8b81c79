use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::advised::AdviceState;
use crate::core::object::Object;
use crate::core::value::Fields;

struct ClassData {
    name: String,
    prototype: Object,
    parent: Option<Class>,
    advice: Option<AdviceState>,
}

/// A constructor: a named handle owning the prototype its instances share
#[derive(Clone)]
pub struct Class(Rc<RefCell<ClassData>>);

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_prototype(name, Fields::new())
    }

    pub fn with_prototype(name: impl Into<String>, prototype: Fields) -> Self {
        Self(Rc::new(RefCell::new(ClassData {
            name: name.into(),
            prototype: Object::from_fields(prototype),
            parent: None,
            advice: None,
        })))
    }

    /// Derives a subclass whose prototype inherits from this one
    ///
    /// The subclass starts out sharing this class's advice state (applied
    /// record and mixed options); the first mixin applied to the subclass
    /// gives it private copies.
    pub fn extend(&self, name: impl Into<String>) -> Class {
        self.extend_with(name, Fields::new())
    }

    pub fn extend_with(&self, name: impl Into<String>, prototype: Fields) -> Class {
        let name = name.into();
        let parent = self.0.borrow();
        let child_prototype = Object::with_proto(&parent.prototype);
        for (key, value) in prototype {
            child_prototype.set(key, value);
        }

        debug!("Extending {} into {}", parent.name, name);

        Class(Rc::new(RefCell::new(ClassData {
            name,
            prototype: child_prototype,
            parent: Some(self.clone()),
            advice: parent.advice.clone(),
        })))
    }

    /// Creates an instance whose prototype is this class's prototype
    pub fn instantiate(&self) -> Object {
        Object::instance_of(self)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn prototype(&self) -> Object {
        self.0.borrow().prototype.clone()
    }

    pub fn parent(&self) -> Option<Class> {
        self.0.borrow().parent.clone()
    }

    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn with_advice<R>(&self, f: impl FnOnce(&mut Option<AdviceState>) -> R) -> R {
        f(&mut self.0.borrow_mut().advice)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Class")
            .field("name", &data.name)
            .field("prototype", &data.prototype)
            .finish()
    }
}
