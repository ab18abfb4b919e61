use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum ImageSwapError {
    /// A URL pattern could not be compiled into a regular expression
    #[error("Invalid URL pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The user supplied glob
        pattern: String,
        /// Why the generated expression was rejected
        reason: String,
    },

    /// An error that occurs when reading from or writing to a settings store
    #[error("Settings store error: {0}")]
    SettingsStore(String),

    /// A stored value could not be encoded or decoded
    #[error("Failed to encode or decode settings: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for ImageSwapError {
    fn from(value: serde_json::Error) -> Self {
        ImageSwapError::Codec(format!("{value}"))
    }
}

/// Raised when a CSS selector cannot be evaluated.
///
/// Selector failures never escape the policy: a selector that fails to
/// evaluate is treated as not matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The selector text is not a well formed selector
    #[error("Malformed selector '{selector}': {reason}")]
    Malformed {
        /// The offending selector text
        selector: String,
        /// What the parser tripped over
        reason: String,
    },

    /// The host rejected the selector while evaluating it
    #[error("Selector '{0}' could not be evaluated")]
    Rejected(String),
}
