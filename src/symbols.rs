// Visual symbols used in diagnostics
// Using generic names that represent meaning rather than the specific emoji

/// Status and feedback symbols
pub const SYMBOL_INDICATOR_WARNING: &str = "⚠️";

/// Process and action symbols
pub const SYMBOL_ACTION_HOOK: &str = "🪝";
