//! Layered error definitions
//!
//! Categorized by source: transport / validation / state / storage / config.
//! The first four categories are the cross-process taxonomy; everything in
//! them is scoped to a single task or session and must never take down
//! unrelated sessions.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Transport Errors =====
    /// Peer (engine instance or viewer) could not be reached
    #[error("transport error to '{peer}': {message}")]
    Transport { peer: String, message: String },

    // ===== Validation Errors =====
    /// Malformed payload or out-of-range control value
    #[error("validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    // ===== State Errors =====
    /// Command referenced an unknown or closed task/session/instance
    #[error("state error for '{subject}': {message}")]
    State { subject: String, message: String },

    // ===== Storage Errors =====
    /// Persistence write failure
    #[error("storage error in '{store}': {message}")]
    Storage { store: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create a transport error
    pub fn transport(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::State {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error invalidates the peer it came from
    /// (transport failures mark engine instances unreachable).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
