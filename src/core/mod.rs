//! Mixin composition: values, objects, classes, advice and merge primitives

pub mod advised;
pub mod class;
pub mod error;
pub mod merge;
pub mod mixin;
pub mod object;
pub mod registry;
pub mod value;
pub mod wrap;
