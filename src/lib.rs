// Library interface for advice
pub mod config;
pub mod core;
pub mod logging;
pub mod symbols;

#[doc(hidden)]
pub use inventory;

// Re-export commonly used types
pub use crate::config::{AdviceConfig, LoggingConfig, MissingMixinPolicy};
pub use crate::core::advised::{add_advice, add_advice_with, Advised, Target};
pub use crate::core::class::Class;
pub use crate::core::error::{AdviceError, Result};
pub use crate::core::mixin::{Behavior, Directive, Mixin, MixinFn, MixinList, Options};
pub use crate::core::object::{BoundMethod, Method, Object};
pub use crate::core::registry::{MixinDescriptor, MixinRegistry};
pub use crate::core::value::{fields, Fields, Value, ValueKind};
pub use crate::core::wrap::{Handler, Wrapper};
