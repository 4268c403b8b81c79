//! Advice wrapping primitives
//!
//! `around` is the only primitive that touches the base method directly;
//! `before` and `after` are expressed through it.

use std::fmt;
use std::rc::Rc;

use crate::core::error::{AdviceError, Result};
use crate::core::object::{BoundMethod, Method, Object};
use crate::core::value::Value;

type WrapperBody = dyn Fn(&Object, &BoundMethod, &[Value]) -> Result<Value>;

/// Function handed the original method (bound to the receiver) plus the call's arguments
#[derive(Clone)]
pub struct Wrapper(Rc<WrapperBody>);

impl Wrapper {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Object, &BoundMethod, &[Value]) -> Result<Value> + 'static,
    {
        Self(Rc::new(body))
    }

    fn call(&self, this: &Object, orig: &BoundMethod, args: &[Value]) -> Result<Value> {
        (self.0)(this, orig, args)
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Wrapper(..)")
    }
}

/// The function run by `before` or `after` advice
#[derive(Clone, Debug)]
pub enum Handler {
    Method(Method),
    /// Resolved by name on `obj` each time the advice runs
    Lookup { obj: Object, name: String },
}

impl Handler {
    pub fn lookup(obj: &Object, name: impl Into<String>) -> Self {
        Handler::Lookup {
            obj: obj.clone(),
            name: name.into(),
        }
    }

    pub fn resolve(&self) -> Result<Method> {
        match self {
            Handler::Method(method) => Ok(method.clone()),
            Handler::Lookup { obj, name } => match obj.get(name) {
                Some(Value::Method(method)) => Ok(method),
                _ => Err(AdviceError::NotCallable { name: name.clone() }),
            },
        }
    }

    pub fn call(&self, this: &Object, args: &[Value]) -> Result<Value> {
        self.resolve()?.call(this, args)
    }

    /// Method form used when there is no base to wrap
    pub(crate) fn into_method(self) -> Method {
        match self {
            Handler::Method(method) => method,
            lookup => Method::new(move |this, args| lookup.call(this, args)),
        }
    }
}

impl From<Method> for Handler {
    fn from(method: Method) -> Self {
        Handler::Method(method)
    }
}

/// Calls `wrapped` with `base` bound to the receiver, followed by the call's arguments
pub fn around(base: Method, wrapped: Wrapper) -> Method {
    Method::new(move |this, args| wrapped.call(this, &base.bind(this), args))
}

/// Runs `pre` with the original arguments, then `base`, returning `base`'s result
pub fn before(base: Method, pre: Handler) -> Method {
    around(
        base,
        Wrapper::new(move |this, orig, args| {
            pre.call(this, args)?;
            orig.call(args)
        }),
    )
}

/// Runs `base`, then `post` with the original arguments, returning `post`'s result
pub fn after(base: Method, post: Handler) -> Method {
    around(
        base,
        Wrapper::new(move |this, orig, args| {
            let _base_result = orig.call(args)?;
            post.call(this, args)
        }),
    )
}
