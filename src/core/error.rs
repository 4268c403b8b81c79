use thiserror::Error;

/// Errors raised while composing advice onto a target or calling its methods
#[derive(Debug, Error)]
pub enum AdviceError {
    /// The target never had `add_advice` called on it (nor on an ancestor)
    #[error("{target} has no advice installed; call add_advice first")]
    NotAdvised { target: String },

    /// A mixin list contained an absent descriptor and the policy is `error`
    #[error("missing mixin while composing {target}")]
    MissingMixin { target: String },

    /// The named property is absent or is not a method
    #[error("'{name}' is not a method")]
    NotCallable { name: String },

    /// Mixin options were neither a JSON object nor null
    #[error("mixin options must be a mapping, got {found}")]
    InvalidOptions { found: String },

    /// Failure raised from inside a user method or mixin function
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type Result<T, E = AdviceError> = std::result::Result<T, E>;
