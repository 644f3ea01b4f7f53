//! Error types for parsing in locus-types.

use thiserror::Error;

/// Errors that can occur when parsing location tracking values.
///
/// This error type is platform-agnostic and does not include
/// provider-specific errors (those belong in locus-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A string did not name any variant of the target enum.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant {
        /// The type being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A value was structurally invalid.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ParseError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}

/// Result type alias using locus-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
