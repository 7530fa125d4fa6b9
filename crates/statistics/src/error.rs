//! Statistics error types

use thiserror::Error;

/// Step payload parse failure
///
/// A parse failure drops the frame (with a logged warning); it is never
/// allowed to take down the stream.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Payload is not valid JSON
    #[error("invalid step payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent under all accepted key aliases
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// Structurally wrong payload (not an object, wrong value types)
    #[error("invalid payload structure: {message}")]
    Invalid { message: String },
}

impl ParseError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
