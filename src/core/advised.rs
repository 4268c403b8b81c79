//! The advice API and mixin composition
//!
//! `add_advice` marks a class or object as advised. From then on the
//! [`Advised`] methods compose behavior onto its behavior surface: the
//! prototype for a class, the object itself otherwise.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::{AdviceConfig, MissingMixinPolicy};
use crate::core::class::Class;
use crate::core::error::{AdviceError, Result};
use crate::core::merge;
use crate::core::mixin::{Behavior, Directive, Mixin, MixinFn, MixinList, Options};
use crate::core::object::{Method, Object};
use crate::core::registry::MixinRegistry;
use crate::core::value::{Fields, Value};
use crate::core::wrap::{self, Handler, Wrapper};
use crate::symbols::*;

/// Per-target composition state
///
/// Both collections are shared with the parent after `Class::extend` and
/// copied on the first write, so a subclass never leaks into its parent.
#[derive(Clone, Debug, Default)]
pub(crate) struct AdviceState {
    applied: Rc<Vec<MixinFn>>,
    options: Rc<Options>,
    policy: MissingMixinPolicy,
}

impl AdviceState {
    fn with_policy(policy: MissingMixinPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// Something advice can be installed on
#[derive(Clone, Debug)]
pub enum Target {
    Class(Class),
    Object(Object),
}

impl Target {
    /// Where methods and fields are installed
    pub fn surface(&self) -> Object {
        match self {
            Target::Class(class) => class.prototype(),
            Target::Object(object) => object.clone(),
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> String {
        match self {
            Target::Class(class) => class.name(),
            Target::Object(object) => object
                .constructor()
                .map(|class| class.name())
                .unwrap_or_else(|| "Object".to_string()),
        }
    }

    fn own_state<R>(&self, f: impl FnOnce(&mut Option<AdviceState>) -> R) -> R {
        match self {
            Target::Class(class) => class.with_advice(f),
            Target::Object(object) => object.with_advice(f),
        }
    }

    fn has_own_state(&self) -> bool {
        self.own_state(|state| state.is_some())
    }

    /// Own state, or the constructor's for an instance that has none
    fn effective_state(&self) -> Option<AdviceState> {
        if let Some(state) = self.own_state(|state| state.clone()) {
            return Some(state);
        }
        match self {
            Target::Object(object) => object
                .constructor()
                .and_then(|class| class.with_advice(|state| state.clone())),
            Target::Class(_) => None,
        }
    }

    pub fn is_advised(&self) -> bool {
        if self.has_own_state() {
            return true;
        }
        match self {
            Target::Class(_) => false,
            Target::Object(object) => {
                let constructor_advised = object
                    .constructor()
                    .is_some_and(|class| Target::Class(class).has_own_state());
                constructor_advised
                    || object
                        .chain()
                        .iter()
                        .skip(1)
                        .any(|layer| layer.with_advice(|state| state.is_some()))
            }
        }
    }

    fn require_advised(&self) -> Result<()> {
        if self.is_advised() {
            Ok(())
        } else {
            Err(AdviceError::NotAdvised {
                target: self.name(),
            })
        }
    }

    /// Gives an advised target its own state, inheriting the policy
    fn ensure_own_state(&self) -> Result<()> {
        self.require_advised()?;
        if !self.has_own_state() {
            let policy = self
                .effective_state()
                .map(|state| state.policy)
                .unwrap_or_default();
            self.own_state(|state| *state = Some(AdviceState::with_policy(policy)));
        }
        Ok(())
    }

    fn policy(&self) -> MissingMixinPolicy {
        self.effective_state()
            .map(|state| state.policy)
            .unwrap_or_default()
    }

    /// Records `mixin` unless already applied; true on first use
    fn record_first_use(&self, mixin: &MixinFn) -> bool {
        self.own_state(|state| {
            let state = state.get_or_insert_with(AdviceState::default);
            if state.applied.iter().any(|applied| applied.ptr_eq(mixin)) {
                return false;
            }
            Rc::make_mut(&mut state.applied).push(mixin.clone());
            true
        })
    }

    /// Drops identities recorded by a composition that failed
    fn forget(&self, recorded: &[MixinFn]) {
        if recorded.is_empty() {
            return;
        }
        self.own_state(|state| {
            if let Some(state) = state {
                Rc::make_mut(&mut state.applied)
                    .retain(|applied| !recorded.iter().any(|mixin| mixin.ptr_eq(applied)));
            }
        });
        debug!("Rolled back {} mixin(s) on {}", recorded.len(), self.name());
    }

    fn merge_options(&self, options: Options) {
        self.own_state(|state| {
            let state = state.get_or_insert_with(AdviceState::default);
            Rc::make_mut(&mut state.options).extend(options);
        });
    }

    fn report_missing(&self) -> Result<()> {
        let target = self.name();
        match self.policy() {
            MissingMixinPolicy::Warn => {
                warn!("{SYMBOL_INDICATOR_WARNING} Missing mixin at {target}");
                Ok(())
            }
            MissingMixinPolicy::Error => Err(AdviceError::MissingMixin { target }),
        }
    }
}

impl From<Class> for Target {
    fn from(class: Class) -> Self {
        Target::Class(class)
    }
}

impl From<&Class> for Target {
    fn from(class: &Class) -> Self {
        Target::Class(class.clone())
    }
}

impl From<Object> for Target {
    fn from(object: Object) -> Self {
        Target::Object(object)
    }
}

impl From<&Object> for Target {
    fn from(object: &Object) -> Self {
        Target::Object(object.clone())
    }
}

/// Installs advice state on a target; calling it again keeps the existing state
pub fn add_advice(target: &impl Advised) {
    let target = target.target();
    target.own_state(|state| {
        if state.is_none() {
            *state = Some(AdviceState::default());
        }
    });
    debug!("{SYMBOL_ACTION_HOOK} Added advice to {}", target.name());
}

/// Like [`add_advice`], taking the missing-mixin policy from configuration
pub fn add_advice_with(target: &impl Advised, config: &AdviceConfig) {
    add_advice(target);
    let policy = config.missing_mixin_policy();
    target.target().own_state(|state| {
        if let Some(state) = state {
            state.policy = policy;
        }
    });
}

enum Placement {
    Before(Handler),
    After(Handler),
    Around(Wrapper),
}

fn install(target: &Target, name: &str, placement: Placement) -> Result<()> {
    target.require_advised()?;
    let surface = target.surface();
    let method = match (merge::find_val(&surface, name), placement) {
        (Some(Value::Method(base)), Placement::Before(handler)) => wrap::before(base, handler),
        (Some(Value::Method(base)), Placement::After(handler)) => wrap::after(base, handler),
        (Some(Value::Method(base)), Placement::Around(wrapper)) => wrap::around(base, wrapper),
        (_, Placement::Around(wrapper)) => wrap::around(Method::identity(), wrapper),
        (_, Placement::Before(handler) | Placement::After(handler)) => {
            debug!("No '{}' on {} to wrap, installing as is", name, target.name());
            handler.into_method()
        }
    };
    surface.set(name, method);
    Ok(())
}

fn parse_options(options: serde_json::Value) -> Result<Option<Options>> {
    match options {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(AdviceError::InvalidOptions {
            found: match other {
                serde_json::Value::Bool(_) => "a boolean",
                serde_json::Value::Number(_) => "a number",
                serde_json::Value::String(_) => "a string",
                _ => "an array",
            }
            .to_string(),
        }),
    }
}

fn mix_into(target: &Target, mixins: MixinList, options: Option<Options>) -> Result<()> {
    target.require_advised()?;
    // Missing descriptors fail before anything is recorded or merged
    for _ in mixins.iter().filter(Option::is_none) {
        target.report_missing()?;
    }

    target.ensure_own_state()?;
    if let Some(options) = options {
        target.merge_options(options);
    }

    let mut recorded = Vec::new();
    let behaviors = match resolve(target, &mixins, &mut recorded) {
        Ok(behaviors) => behaviors,
        Err(error) => {
            target.forget(&recorded);
            return Err(error);
        }
    };

    for behavior in behaviors {
        for directive in behavior.ordered() {
            apply(target, directive)?;
        }
    }
    Ok(())
}

/// Runs each not yet applied mixin function, collecting the behaviors to apply
///
/// Identities are recorded before the call so a mixin that re-enters
/// composition does not run twice. `recorded` lets the caller undo them.
fn resolve(
    target: &Target,
    mixins: &MixinList,
    recorded: &mut Vec<MixinFn>,
) -> Result<Vec<Behavior>> {
    let mut behaviors = Vec::with_capacity(mixins.len());
    for mixin in mixins.iter() {
        match mixin {
            None => {}
            Some(Mixin::Behavior(behavior)) => behaviors.push(behavior.clone()),
            Some(Mixin::Function(mixin)) => {
                if !target.record_first_use(mixin) {
                    debug!(
                        "Mixin '{}' already applied to {}, skipping",
                        mixin.name(),
                        target.name()
                    );
                    continue;
                }
                recorded.push(mixin.clone());
                debug!("Applying mixin '{}' to {}", mixin.name(), target.name());
                let options = target.mixed_options();
                if let Some(behavior) = mixin.call(target, &options)? {
                    behaviors.push(behavior);
                }
            }
        }
    }
    Ok(behaviors)
}

fn apply(target: &Target, directive: Directive) -> Result<()> {
    let single = |key: String, value: Value| Fields::from([(key, value)]);
    match directive {
        Directive::Mixin(mixins) => mix_into(target, mixins, None),
        Directive::Around(name, wrapper) => install(target, &name, Placement::Around(wrapper)),
        Directive::After(name, handler) => install(target, &name, Placement::After(handler)),
        Directive::Before(name, handler) => install(target, &name, Placement::Before(handler)),
        Directive::Clobber(key, value) => {
            merge::clobber(&target.surface(), single(key, value));
            Ok(())
        }
        Directive::AddToObj(key, fields) => {
            merge::add_to_obj(&target.surface(), single(key, Value::Map(fields)));
            Ok(())
        }
        Directive::SetDefaults(key, value) => {
            merge::set_defaults(&target.surface(), single(key, value));
            Ok(())
        }
        field @ Directive::Field(..) => apply(target, field.route()),
    }
}

/// The advice API: wrapping, merging and mixin composition
///
/// Every mutating method returns the receiver so calls can be chained with `?`.
pub trait Advised {
    fn target(&self) -> Target;

    /// Runs `handler` before the current `name` method
    fn before(&self, name: &str, handler: impl Into<Handler>) -> Result<&Self> {
        install(&self.target(), name, Placement::Before(handler.into()))?;
        Ok(self)
    }

    /// Runs `handler` after the current `name` method, returning the handler's result
    fn after(&self, name: &str, handler: impl Into<Handler>) -> Result<&Self> {
        install(&self.target(), name, Placement::After(handler.into()))?;
        Ok(self)
    }

    /// Replaces `name` with `wrapper`, which receives the original bound to the receiver
    fn around(&self, name: &str, wrapper: Wrapper) -> Result<&Self> {
        install(&self.target(), name, Placement::Around(wrapper))?;
        Ok(self)
    }

    fn before_each<I, K, H>(&self, entries: I) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        for (name, handler) in entries {
            self.before(name.as_ref(), handler)?;
        }
        Ok(self)
    }

    fn after_each<I, K, H>(&self, entries: I) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        for (name, handler) in entries {
            self.after(name.as_ref(), handler)?;
        }
        Ok(self)
    }

    fn around_each<I, K>(&self, entries: I) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, Wrapper)>,
        K: AsRef<str>,
    {
        for (name, wrapper) in entries {
            self.around(name.as_ref(), wrapper)?;
        }
        Ok(self)
    }

    fn clobber(&self, key: &str, value: impl Into<Value>) -> Result<&Self> {
        self.clobber_all(Fields::from([(key.to_string(), value.into())]))
    }

    fn clobber_all(&self, values: Fields) -> Result<&Self> {
        let target = self.target();
        target.require_advised()?;
        merge::clobber(&target.surface(), values);
        Ok(self)
    }

    fn add_to_obj(&self, values: Fields) -> Result<&Self> {
        let target = self.target();
        target.require_advised()?;
        merge::add_to_obj(&target.surface(), values);
        Ok(self)
    }

    fn set_defaults(&self, values: Fields) -> Result<&Self> {
        let target = self.target();
        target.require_advised()?;
        merge::set_defaults(&target.surface(), values);
        Ok(self)
    }

    /// First truthy value for `name` on the behavior surface and its prototypes
    fn find_val(&self, name: &str) -> Option<Value> {
        merge::find_val(&self.target().surface(), name)
    }

    /// Composes one or more mixins, applying each mixin function at most once
    ///
    /// `options` must be a JSON object (merged into the accumulated options)
    /// or `null`.
    fn mixin(&self, mixins: impl Into<MixinList>, options: serde_json::Value) -> Result<&Self> {
        let options = parse_options(options)?;
        mix_into(&self.target(), mixins.into(), options)?;
        Ok(self)
    }

    /// Composes mixins registered under `names`; unknown names count as missing
    fn mixin_named(&self, names: &[&str], options: serde_json::Value) -> Result<&Self> {
        let mixins: Vec<Option<Mixin>> = names
            .iter()
            .map(|name| {
                let found = MixinRegistry::get(name);
                if found.is_none() {
                    debug!("No registered mixin named '{}'", name);
                }
                found.map(Mixin::from)
            })
            .collect();
        self.mixin(mixins, options)
    }

    /// Invokes `mixin` once with `options`, without tracking or applying its result
    fn add_mixin(&self, mixin: &MixinFn, options: serde_json::Value) -> Result<&Self> {
        let target = self.target();
        target.require_advised()?;
        let options = parse_options(options)?.unwrap_or_default();
        if mixin.call(&target, &options)?.is_some() {
            debug!(
                "Ignoring behavior returned by '{}' through add_mixin",
                mixin.name()
            );
        }
        Ok(self)
    }

    fn has_mixin(&self, mixin: &MixinFn) -> bool {
        self.applied_mixins()
            .iter()
            .any(|applied| applied.ptr_eq(mixin))
    }

    /// Applied mixin functions, in application order
    fn applied_mixins(&self) -> Vec<MixinFn> {
        self.target()
            .effective_state()
            .map(|state| state.applied.as_ref().clone())
            .unwrap_or_default()
    }

    /// Options accumulated across `mixin` calls
    fn mixed_options(&self) -> Options {
        self.target()
            .effective_state()
            .map(|state| state.options.as_ref().clone())
            .unwrap_or_default()
    }
}

impl Advised for Target {
    fn target(&self) -> Target {
        self.clone()
    }
}

impl Advised for Class {
    fn target(&self) -> Target {
        Target::Class(self.clone())
    }
}

impl Advised for Object {
    fn target(&self) -> Target {
        Target::Object(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::fields;
    use serde_json::json;
    use std::cell::Cell;

    fn counter_class(name: &str) -> Class {
        let class = Class::with_prototype(
            name,
            fields([
                ("number", Value::from(1)),
                (
                    "getNumber",
                    Value::Method(Method::new(|this, _| {
                        Ok(this.get("number").unwrap_or_default())
                    })),
                ),
            ]),
        );
        add_advice(&class);
        class
    }

    fn increment() -> Method {
        Method::new(|this, _| {
            let number = this.get("number").and_then(|v| v.as_number()).unwrap_or(0.0);
            this.set("number", number + 1.0);
            Ok(Value::from(number + 1.0))
        })
    }

    #[test]
    fn test_directives_require_advice() {
        let class = Class::new("Plain");

        assert!(matches!(
            class.clobber("a", 1),
            Err(AdviceError::NotAdvised { ref target }) if target == "Plain"
        ));
        assert!(class.mixin(MixinList::new(), json!(null)).is_err());
        assert!(!class.has_mixin(&MixinFn::new("m", |_, _| Ok(None))));
    }

    #[test]
    fn test_add_advice_twice_keeps_record() -> Result<()> {
        let class = counter_class("Twice");
        let mixin = MixinFn::new("noop", |_, _| Ok(None));
        class.mixin(mixin.clone(), json!(null))?;

        add_advice(&class);
        assert!(class.has_mixin(&mixin));
        Ok(())
    }

    #[test]
    fn test_before_after_around_chain() -> Result<()> {
        let class = counter_class("Chain");
        class
            .before("getNumber", increment())?
            .around(
                "getNumber",
                Wrapper::new(|_, orig, args| {
                    let value = orig.call(args)?.as_number().unwrap_or(0.0);
                    Ok(Value::from(value * 10.0))
                }),
            )?;

        assert_eq!(class.instantiate().call("getNumber", &[])?, Value::from(20));
        Ok(())
    }

    #[test]
    fn test_missing_method_installs_handler_directly() -> Result<()> {
        let class = counter_class("Fresh");
        class.after("returnBar", Method::new(|_, _| Ok(Value::from("bar"))))?;
        class.around(
            "echo",
            Wrapper::new(|_, orig, args| orig.call(args)),
        )?;

        let instance = class.instantiate();
        assert_eq!(instance.call("returnBar", &[])?, Value::from("bar"));
        assert_eq!(instance.call("echo", &[Value::from(5)])?, Value::from(5));
        Ok(())
    }

    #[test]
    fn test_fan_out_applies_each_entry() -> Result<()> {
        let class = counter_class("FanOut");
        class.after_each([
            ("getNumber", Method::new(|_, _| Ok(Value::from("after")))),
            ("other", Method::new(|_, _| Ok(Value::from("other")))),
        ])?;

        let instance = class.instantiate();
        assert_eq!(instance.call("getNumber", &[])?, Value::from("after"));
        assert_eq!(instance.call("other", &[])?, Value::from("other"));
        Ok(())
    }

    #[test]
    fn test_mixin_function_runs_once() -> Result<()> {
        let class = counter_class("Once");
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mixin = MixinFn::new("counted", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(None)
        });

        class
            .mixin(vec![mixin.clone(), mixin.clone()], json!(null))?
            .mixin(mixin.clone(), json!(null))?;

        assert_eq!(calls.get(), 1);
        assert_eq!(class.applied_mixins().len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_descriptor_is_skipped_by_default() -> Result<()> {
        let class = counter_class("Gaps");
        let list = MixinList::from(vec![
            None,
            Some(Mixin::from(Behavior::new().clobber("after_gap", true))),
        ]);
        class.mixin(list, json!(null))?;

        assert_eq!(class.find_val("after_gap"), Some(Value::Bool(true)));
        Ok(())
    }

    #[test]
    fn test_missing_descriptor_fails_under_error_policy() {
        let class = Class::new("Strict");
        let config = AdviceConfig {
            missing_mixin: Some(MissingMixinPolicy::Error),
            ..AdviceConfig::default()
        };
        add_advice_with(&class, &config);

        let result = class.mixin(Option::<Mixin>::None, json!(null));
        assert!(matches!(
            result,
            Err(AdviceError::MissingMixin { ref target }) if target == "Strict"
        ));
    }

    #[test]
    fn test_options_must_be_a_mapping() {
        let class = counter_class("Options");

        assert!(matches!(
            class.mixin(MixinList::new(), json!([1, 2])),
            Err(AdviceError::InvalidOptions { ref found }) if found == "an array"
        ));
        assert!(class.mixin(MixinList::new(), json!({"a": 1})).is_ok());
        assert_eq!(class.mixed_options().get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_add_mixin_is_untracked() -> Result<()> {
        let class = counter_class("Manual");
        let mixin = MixinFn::new("manual", |this, options| {
            let step = options.get("step").and_then(|v| v.as_f64()).unwrap_or(1.0);
            this.before(
                "getNumber",
                Method::new(move |this, _| {
                    let number = this.get("number").and_then(|v| v.as_number()).unwrap_or(0.0);
                    this.set("number", number + step);
                    Ok(Value::Null)
                }),
            )?;
            Ok(Some(Behavior::new().clobber("ignored", true)))
        });

        class.add_mixin(&mixin, json!({"step": 4}))?;

        assert!(!class.has_mixin(&mixin));
        assert_eq!(class.find_val("ignored"), None);
        assert_eq!(class.instantiate().call("getNumber", &[])?, Value::from(5));
        Ok(())
    }

    #[test]
    fn test_instance_inherits_api_and_constructor_record() -> Result<()> {
        let class = counter_class("Host");
        let mixin = MixinFn::new("host", |_, _| Ok(None));
        class.mixin(mixin.clone(), json!(null))?;

        let instance = class.instantiate();
        assert!(instance.has_mixin(&mixin));

        instance.before("getNumber", increment())?;
        assert_eq!(instance.call("getNumber", &[])?, Value::from(2));
        assert!(class.prototype().get_own("getNumber").is_some());
        assert!(instance.has_own("getNumber"));

        let own = MixinFn::new("own", |_, _| Ok(None));
        instance.mixin(own.clone(), json!(null))?;
        assert!(instance.has_mixin(&own));
        assert!(!instance.has_mixin(&mixin));
        assert!(!class.has_mixin(&own));
        Ok(())
    }

    #[test]
    fn test_plain_object_target() -> Result<()> {
        let object = Object::from_fields(fields([("val", "foo")]));
        add_advice(&object);
        object
            .clobber("getValue", Method::new(|this, _| Ok(this.get("val").unwrap_or_default())))?
            .after("getValue", Method::new(|_, _| Ok(Value::from("bar"))))?;

        assert_eq!(object.call("getValue", &[])?, Value::from("bar"));
        assert_eq!(Target::from(&object).name(), "Object");
        Ok(())
    }

    #[test]
    fn test_error_policy_failure_leaves_no_record() -> Result<()> {
        let class = Class::new("Strict");
        let config = AdviceConfig {
            missing_mixin: Some(MissingMixinPolicy::Error),
            ..AdviceConfig::default()
        };
        add_advice_with(&class, &config);
        let calls = Rc::new(Cell::new(0));
        let counted = Rc::clone(&calls);
        let mixin = MixinFn::new("marked", move |_, _| {
            counted.set(counted.get() + 1);
            Ok(Some(Behavior::new().clobber("marked", true)))
        });

        let list = MixinList::from(vec![Some(Mixin::from(mixin.clone())), None]);
        assert!(class.mixin(list, json!({"partial": true})).is_err());
        assert_eq!(calls.get(), 0);
        assert!(!class.has_mixin(&mixin));
        assert!(class.mixed_options().get("partial").is_none());

        class.mixin(mixin.clone(), json!(null))?;
        assert_eq!(calls.get(), 1);
        assert!(class.has_mixin(&mixin));
        assert_eq!(class.find_val("marked"), Some(Value::Bool(true)));
        Ok(())
    }

    #[test]
    fn test_failed_mixin_can_be_retried() -> Result<()> {
        let class = counter_class("Flaky");
        let attempts = Rc::new(Cell::new(0));
        let seen = Rc::clone(&attempts);
        let flaky = MixinFn::new("flaky", move |_, _| {
            seen.set(seen.get() + 1);
            if seen.get() == 1 {
                return Err(anyhow::anyhow!("not ready").into());
            }
            Ok(Some(Behavior::new().clobber("ready", true)))
        });
        let steady = MixinFn::new("steady", |_, _| {
            Ok(Some(Behavior::new().clobber("steady", true)))
        });

        let list: MixinList = vec![steady.clone(), flaky.clone()].into();
        assert!(class.mixin(list, json!(null)).is_err());
        assert!(!class.has_mixin(&flaky));
        assert!(!class.has_mixin(&steady));
        assert_eq!(class.find_val("steady"), None);

        class.mixin(vec![steady.clone(), flaky.clone()], json!(null))?;
        assert_eq!(attempts.get(), 2);
        assert_eq!(class.find_val("ready"), Some(Value::Bool(true)));
        assert_eq!(class.find_val("steady"), Some(Value::Bool(true)));
        assert_eq!(class.applied_mixins().len(), 2);
        Ok(())
    }
}
