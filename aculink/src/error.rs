use thiserror::Error;

/// Errors produced while decoding a bridge payload.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    /// The body is not valid form encoding (a `%` not followed by two hex
    /// digits).
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    /// A required key (`mt` or `id`) is absent or empty.
    #[error("'{0}' not found in data")]
    MissingField(&'static str),

    /// A present field could not be sliced or parsed.
    #[error("malformed value {value:?} for '{field}'")]
    MalformedField { field: &'static str, value: String },

    #[error("unknown wind direction {0:?}")]
    UnknownWindDirection(String),

    #[error(transparent)]
    Coefficient(#[from] CoefficientError),
}

/// Errors produced while reading the pressure sensor coefficient set.
#[derive(Debug, Error, PartialEq)]
pub enum CoefficientError {
    #[error("no value for '{0}' found when parsing pressure")]
    Missing(&'static str),

    #[error("coefficient '{key}' is not hexadecimal: {value:?}")]
    Malformed { key: &'static str, value: String },
}
