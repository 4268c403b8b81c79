//! Mixin descriptors and the behaviors they produce
//!
//! A behavior is an ordered list of tagged directives. The composer never
//! looks at key names to decide what to do: the tag says it.

use std::fmt;
use std::rc::Rc;

use crate::core::advised::Target;
use crate::core::error::Result;
use crate::core::object::Method;
use crate::core::value::{Fields, Value};
use crate::core::wrap::{Handler, Wrapper};

/// Accumulated options handed to mixin functions
pub type Options = serde_json::Map<String, serde_json::Value>;

type MixinBody = dyn Fn(&Target, &Options) -> Result<Option<Behavior>>;

/// A named mixin function, tracked by identity once applied
///
/// Clones share identity; two functions built separately never compare equal,
/// even with the same name.
#[derive(Clone)]
pub struct MixinFn {
    name: Rc<str>,
    body: Rc<MixinBody>,
}

impl MixinFn {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Target, &Options) -> Result<Option<Behavior>> + 'static,
    {
        Self {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Target, options: &Options) -> Result<Option<Behavior>> {
        (self.body)(this, options)
    }

    pub fn ptr_eq(&self, other: &MixinFn) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for MixinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MixinFn({})", self.name)
    }
}

impl PartialEq for MixinFn {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Either a function producing a behavior or a behavior given directly
#[derive(Clone, Debug)]
pub enum Mixin {
    Function(MixinFn),
    Behavior(Behavior),
}

impl From<MixinFn> for Mixin {
    fn from(mixin: MixinFn) -> Self {
        Mixin::Function(mixin)
    }
}

impl From<Behavior> for Mixin {
    fn from(behavior: Behavior) -> Self {
        Mixin::Behavior(behavior)
    }
}

/// Descriptors handed to `mixin`; `None` marks an absent descriptor
#[derive(Clone, Debug, Default)]
pub struct MixinList(Vec<Option<Mixin>>);

impl MixinList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mixin: impl Into<Mixin>) {
        self.0.push(Some(mixin.into()));
    }

    pub fn push_missing(&mut self) {
        self.0.push(None);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Mixin>> {
        self.0.iter().map(Option::as_ref)
    }
}

impl From<Mixin> for MixinList {
    fn from(mixin: Mixin) -> Self {
        Self(vec![Some(mixin)])
    }
}

impl From<MixinFn> for MixinList {
    fn from(mixin: MixinFn) -> Self {
        Mixin::from(mixin).into()
    }
}

impl From<Behavior> for MixinList {
    fn from(behavior: Behavior) -> Self {
        Mixin::from(behavior).into()
    }
}

impl From<Option<Mixin>> for MixinList {
    fn from(mixin: Option<Mixin>) -> Self {
        Self(vec![mixin])
    }
}

impl From<Vec<Option<Mixin>>> for MixinList {
    fn from(mixins: Vec<Option<Mixin>>) -> Self {
        Self(mixins)
    }
}

impl From<Vec<Mixin>> for MixinList {
    fn from(mixins: Vec<Mixin>) -> Self {
        Self(mixins.into_iter().map(Some).collect())
    }
}

impl From<Vec<MixinFn>> for MixinList {
    fn from(mixins: Vec<MixinFn>) -> Self {
        Self(mixins.into_iter().map(|m| Some(Mixin::from(m))).collect())
    }
}

impl FromIterator<Mixin> for MixinList {
    fn from_iter<I: IntoIterator<Item = Mixin>>(iter: I) -> Self {
        Self(iter.into_iter().map(Some).collect())
    }
}

/// One entry of a behavior
#[derive(Clone, Debug)]
pub enum Directive {
    Mixin(MixinList),
    Around(String, Wrapper),
    After(String, Handler),
    Before(String, Handler),
    Clobber(String, Value),
    AddToObj(String, Fields),
    SetDefaults(String, Value),
    /// Untagged field, routed by the kind of its value
    Field(String, Value),
}

/// Application order of directives; `Field` entries always come last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Mixin,
    Around,
    After,
    Before,
    Clobber,
    AddToObj,
    SetDefaults,
    Field,
}

impl Directive {
    pub fn phase(&self) -> Phase {
        match self {
            Directive::Mixin(_) => Phase::Mixin,
            Directive::Around(..) => Phase::Around,
            Directive::After(..) => Phase::After,
            Directive::Before(..) => Phase::Before,
            Directive::Clobber(..) => Phase::Clobber,
            Directive::AddToObj(..) => Phase::AddToObj,
            Directive::SetDefaults(..) => Phase::SetDefaults,
            Directive::Field(..) => Phase::Field,
        }
    }

    /// Resolves an untagged field to the directive its value kind implies
    ///
    /// Methods become `after` advice, mappings are merged with `add_to_obj`,
    /// everything else is clobbered. Tagged directives are returned as is.
    pub fn route(self) -> Directive {
        match self {
            Directive::Field(key, value) => match value {
                Value::Method(method) => Directive::After(key, Handler::Method(method)),
                Value::Map(fields) => Directive::AddToObj(key, fields),
                other => Directive::Clobber(key, other),
            },
            tagged => tagged,
        }
    }
}

/// A mixin behavior object: directives applied in phase order
#[derive(Clone, Debug, Default)]
pub struct Behavior {
    directives: Vec<Directive>,
}

impl Behavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mixin(mut self, mixins: impl Into<MixinList>) -> Self {
        self.directives.push(Directive::Mixin(mixins.into()));
        self
    }

    pub fn around(mut self, name: impl Into<String>, wrapper: Wrapper) -> Self {
        self.directives.push(Directive::Around(name.into(), wrapper));
        self
    }

    pub fn after(mut self, name: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.directives
            .push(Directive::After(name.into(), handler.into()));
        self
    }

    pub fn before(mut self, name: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.directives
            .push(Directive::Before(name.into(), handler.into()));
        self
    }

    pub fn clobber(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.directives
            .push(Directive::Clobber(key.into(), value.into()));
        self
    }

    pub fn add_to_obj(mut self, key: impl Into<String>, fields: Fields) -> Self {
        self.directives.push(Directive::AddToObj(key.into(), fields));
        self
    }

    pub fn set_defaults(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.directives
            .push(Directive::SetDefaults(key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.directives
            .push(Directive::Field(key.into(), value.into()));
        self
    }

    /// Shorthand for a method field, which lands as `after` advice
    pub fn method(self, key: impl Into<String>, method: Method) -> Self {
        self.field(key, Value::Method(method))
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Directives in application order, stable within each phase
    pub fn ordered(&self) -> Vec<Directive> {
        let mut ordered = self.directives.clone();
        ordered.sort_by_key(Directive::phase);
        ordered
    }
}
