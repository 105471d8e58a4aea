//! Error taxonomy for the synthesis engine.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SynthError>;

/// Errors raised by engine operations and the recipe catalog.
///
/// Engine calls fail fast on configurations that cannot be clamped into a
/// valid state. Silence is never an error.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// Filter spec that cannot be clamped into a stable design
    #[error("invalid filter: {reason}")]
    InvalidFilter { reason: String },

    /// Out-of-range parameter for a generator, envelope or effect
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Feedback gain that would make the comb recurrence grow without bound
    #[error("feedback decay {decay} is outside [0, 1); the comb recurrence would be unstable")]
    UnstableFeedback { decay: f32 },

    /// Signals with different sample rates combined into one mix
    #[error("sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },

    /// Recipe name not present in the catalog
    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),

    /// Two recipes with the same name in one catalog file
    #[error("recipe `{0}` is declared more than once")]
    DuplicateRecipe(String),

    /// Catalog TOML that does not match the recipe schema
    #[error("failed to parse recipe catalog: {0}")]
    Catalog(#[from] toml::de::Error),

    /// Catalog TOML that could not be serialized back out
    #[error("failed to serialize recipe: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SynthError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn filter(reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            reason: reason.into(),
        }
    }
}
