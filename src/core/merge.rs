//! Merge primitives operating on a behavior surface

use tracing::debug;

use crate::core::object::Object;
use crate::core::value::{truthy, Fields, Value};

/// Finds the first truthy entry for `name`, climbing from `obj` to the root prototype
///
/// A defined but falsy entry does not stop the climb. When nothing truthy is
/// found the root's entry is returned, whatever it holds.
pub fn find_val(obj: &Object, name: &str) -> Option<Value> {
    let mut root_value = None;
    for layer in obj.chain() {
        let value = layer.get_own(name);
        if truthy(value.as_ref()) {
            return value;
        }
        root_value = value;
    }
    root_value
}

/// Overwrites every key of `values` on `surface`
pub fn clobber(surface: &Object, values: Fields) {
    for (key, value) in values {
        debug!("Clobbering '{}'", key);
        surface.set(key, value);
    }
}

/// Merges each sub-mapping into the mapping already found under its key
///
/// New inner keys overwrite matching inner keys; siblings are kept. An
/// existing value that is not a mapping is replaced.
pub fn add_to_obj(surface: &Object, values: Fields) {
    for (key, value) in values {
        let mut merged = match find_val(surface, &key) {
            Some(Value::Map(existing)) => existing,
            _ => Fields::new(),
        };
        match value {
            Value::Map(additions) => merged.extend(additions),
            other => {
                debug!("Ignoring non-mapping value for '{}': {:?}", key, other);
            }
        }
        debug!("Merging into '{}' ({} entries)", key, merged.len());
        surface.set(key, Value::Map(merged));
    }
}

/// Sets each key only where no truthy value is found for it yet
pub fn set_defaults(surface: &Object, values: Fields) {
    for (key, value) in values {
        if truthy(find_val(surface, &key).as_ref()) {
            debug!("Keeping existing value for '{}'", key);
            continue;
        }
        debug!("Defaulting '{}'", key);
        surface.set(key, value);
    }
}
