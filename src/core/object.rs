use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::advised::AdviceState;
use crate::core::class::Class;
use crate::core::error::{AdviceError, Result};
use crate::core::value::{Fields, Value};

type MethodBody = dyn Fn(&Object, &[Value]) -> Result<Value>;

/// A callable stored on a behavior surface
///
/// The receiver is passed explicitly as the first argument; methods compare
/// by identity, never by behavior.
#[derive(Clone)]
pub struct Method(Rc<MethodBody>);

impl Method {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> Result<Value> + 'static,
    {
        Self(Rc::new(body))
    }

    /// Returns its first argument, or `Null` when called without one
    pub fn identity() -> Self {
        Self::new(|_, args| Ok(args.first().cloned().unwrap_or_default()))
    }

    pub fn call(&self, this: &Object, args: &[Value]) -> Result<Value> {
        (self.0)(this, args)
    }

    /// Binds the method to a receiver
    pub fn bind(&self, this: &Object) -> BoundMethod {
        BoundMethod {
            method: self.clone(),
            this: this.clone(),
        }
    }

    pub fn ptr_eq(&self, other: &Method) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

/// A method paired with the receiver it will run against
#[derive(Clone, Debug)]
pub struct BoundMethod {
    method: Method,
    this: Object,
}

impl BoundMethod {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.method.call(&self.this, args)
    }

    pub fn this(&self) -> &Object {
        &self.this
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

#[derive(Default)]
struct ObjectData {
    fields: Fields,
    proto: Option<Object>,
    constructor: Option<Class>,
    advice: Option<AdviceState>,
}

/// Shared handle to a mutable object with an optional prototype
///
/// Reads walk the prototype chain, writes always land on the object itself.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            fields,
            ..ObjectData::default()
        })))
    }

    /// Creates an empty object whose prototype is `proto`
    pub fn with_proto(proto: &Object) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            proto: Some(proto.clone()),
            ..ObjectData::default()
        })))
    }

    pub(crate) fn instance_of(class: &Class) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            proto: Some(class.prototype()),
            constructor: Some(class.clone()),
            ..ObjectData::default()
        })))
    }

    /// First defined entry for `name` along the prototype chain
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            let data = object.0.borrow();
            if let Some(value) = data.fields.get(name) {
                return Some(value.clone());
            }
            current = data.proto.clone();
        }
        None
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.0.borrow().fields.get(name).cloned()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().fields.contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0
            .borrow_mut()
            .fields
            .insert(name.into(), value.into());
    }

    /// Own keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().fields.keys().cloned().collect()
    }

    pub fn proto(&self) -> Option<Object> {
        self.0.borrow().proto.clone()
    }

    pub fn constructor(&self) -> Option<Class> {
        self.0.borrow().constructor.clone()
    }

    /// Looks up `name` and invokes it with this object as receiver
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Some(Value::Method(method)) => method.call(self, args),
            _ => Err(AdviceError::NotCallable {
                name: name.to_string(),
            }),
        }
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Objects from the receiver up to the root prototype
    pub(crate) fn chain(&self) -> Vec<Object> {
        let mut layers = vec![self.clone()];
        while let Some(proto) = layers.last().and_then(Object::proto) {
            layers.push(proto);
        }
        layers
    }

    pub(crate) fn with_advice<R>(&self, f: impl FnOnce(&mut Option<AdviceState>) -> R) -> R {
        f(&mut self.0.borrow_mut().advice)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Object")
            .field("fields", &data.fields)
            .field("has_proto", &data.proto.is_some())
            .finish()
    }
}
