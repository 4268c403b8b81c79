//! Named mixin catalog with link-time registration
//!
//! Mixins submitted with [`register_mixin!`](crate::register_mixin) can be
//! composed by name through `Advised::mixin_named`. Each name resolves to one
//! `MixinFn` per thread, so applying it by name repeatedly stays idempotent.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::mixin::MixinFn;

/// Mixin descriptor for auto-registration
#[derive(Debug, Clone)]
pub struct MixinDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn() -> MixinFn,
}

// Inventory collection for auto-registering mixins
inventory::collect!(MixinDescriptor);

thread_local! {
    static RESOLVED: RefCell<HashMap<&'static str, MixinFn>> = RefCell::new(HashMap::new());
}

/// Lookup over every registered mixin descriptor
pub struct MixinRegistry;

impl MixinRegistry {
    /// Finds the descriptor registered under `name`
    pub fn descriptor(name: &str) -> Option<&'static MixinDescriptor> {
        inventory::iter::<MixinDescriptor>
            .into_iter()
            .find(|descriptor| descriptor.name == name)
    }

    /// Returns the mixin registered under `name`, building it on first use
    pub fn get(name: &str) -> Option<MixinFn> {
        let descriptor = Self::descriptor(name)?;
        let mixin = RESOLVED.with(|resolved| {
            resolved
                .borrow_mut()
                .entry(descriptor.name)
                .or_insert_with(descriptor.factory)
                .clone()
        });
        Some(mixin)
    }

    pub fn contains(name: &str) -> bool {
        Self::descriptor(name).is_some()
    }

    /// `(name, description)` of every registered mixin, sorted by name
    pub fn list() -> Vec<(&'static str, &'static str)> {
        let mut mixins: Vec<_> = inventory::iter::<MixinDescriptor>
            .into_iter()
            .map(|descriptor| (descriptor.name, descriptor.description))
            .collect();
        mixins.sort_by_key(|(name, _)| *name);
        mixins
    }
}

/// Registers a mixin factory under a name
///
/// Usage:
/// ```rust,ignore
/// fn evented() -> MixinFn { MixinFn::new("evented", |_, _| Ok(None)) }
/// register_mixin!("evented", "Adds an events table", evented);
/// ```
#[macro_export]
macro_rules! register_mixin {
    ($name:literal, $description:literal, $factory:path) => {
        $crate::inventory::submit! {
            $crate::core::registry::MixinDescriptor {
                name: $name,
                description: $description,
                factory: $factory,
            }
        }
    };
}
