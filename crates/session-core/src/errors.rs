//! Error types for session coordination.
//!
//! Invalid state-machine dispatches are never errors: they are ignored and logged.
//! The variants here cover construction mistakes, collaborator failures (signaling,
//! media, peer connection) and malformed inbound signals.

use thiserror::Error;

/// Errors raised by session-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A required capability was not supplied at construction
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// Configuration values are out of range
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// No live session with the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A live session with the given id already exists
    #[error("Duplicate session: {0}")]
    DuplicateSession(String),

    /// The signaling channel refused or failed to deliver a signal
    #[error("Signaling failed: {0}")]
    SignalingFailed(String),

    /// Device access or local media failure
    #[error("Media error: {0}")]
    MediaError(String),

    /// The platform peer connection reported an error
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// An inbound signal could not be parsed or is missing required fields
    #[error("Malformed signal: {0}")]
    MalformedSignal(String),

    /// Operation is not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SessionError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn signaling(reason: impl Into<String>) -> Self {
        Self::SignalingFailed(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSignal(reason.into())
    }

    /// Whether this error came from the signaling transport
    pub fn is_signaling_failure(&self) -> bool {
        matches!(self, Self::SignalingFailed(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedSignal(err.to_string())
    }
}

/// Result alias for session-core operations
pub type SessionResult<T> = Result<T, SessionError>;
