//! Error types and handling for the client-core library
//!
//! Errors are grouped so callers can pick a recovery strategy:
//!
//! - **Connection errors** - the signaling connection is missing or failed, usually
//!   recoverable by reconnecting
//! - **Call errors** - unknown sessions or operations invalid for the session state
//! - **Media errors** - device access or peer connection problems
//! - **Configuration errors** - invalid settings, fix the configuration first
//!
//! ```rust,no_run
//! # use peerlink_client_core::{Client, ClientError};
//! # use std::sync::Arc;
//! # async fn example(client: Arc<Client>) {
//! match client.start_call("bob".into(), None) {
//!     Ok(session) => println!("calling, session {}", session.id()),
//!     Err(ClientError::NotConnected) => eprintln!("connect first"),
//!     Err(e) if e.is_recoverable() => eprintln!("retry later: {}", e),
//!     Err(e) => eprintln!("call failed ({}): {}", e.category(), e),
//! }
//! # }
//! ```

use peerlink_session_core::{SessionError, SessionId};
use thiserror::Error;

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection errors
    #[error("Not connected to the signaling service")]
    NotConnected,

    #[error("Already connected as {endpoint}")]
    AlreadyConnected { endpoint: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    #[error("Connection timeout")]
    ConnectionTimeout,

    /// Call related errors
    #[error("Call not found: {session_id}")]
    CallNotFound { session_id: SessionId },

    #[error("Call setup failed: {reason}")]
    CallSetupFailed { reason: String },

    #[error("Invalid call state for {session_id}: {reason}")]
    InvalidCallState { session_id: SessionId, reason: String },

    #[error("Too many sessions: limit is {limit}")]
    TooManySessions { limit: usize },

    /// Media related errors
    #[error("Media error: {details}")]
    MediaError { details: String },

    /// Protocol errors
    #[error("Protocol error: {reason}")]
    ProtocolError { reason: String },

    /// Group errors
    #[error("Group {group}: {reason}")]
    GroupError { group: String, reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// Session layer errors without a closer client equivalent
    #[error("Session error: {reason}")]
    SessionManagerError { reason: String },

    /// Generic errors
    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Operation timeout after {duration_ms}ms")]
    OperationTimeout { duration_ms: u64 },
}

impl ClientError {
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed { reason: reason.into() }
    }

    pub fn network_error(reason: impl Into<String>) -> Self {
        Self::NetworkError { reason: reason.into() }
    }

    pub fn call_setup_failed(reason: impl Into<String>) -> Self {
        Self::CallSetupFailed { reason: reason.into() }
    }

    pub fn protocol_error(reason: impl Into<String>) -> Self {
        Self::ProtocolError { reason: reason.into() }
    }

    pub fn group_error(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GroupError {
            group: group.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::NetworkError { .. }
            | ClientError::ConnectionTimeout
            | ClientError::NotConnected
            | ClientError::OperationTimeout { .. }
            | ClientError::TooManySessions { .. } => true,

            ClientError::InvalidConfiguration { .. }
            | ClientError::MissingConfiguration { .. }
            | ClientError::AuthenticationFailed { .. }
            | ClientError::ProtocolError { .. } => false,

            _ => false,
        }
    }

    /// Check if error indicates authentication issue
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ClientError::AuthenticationFailed { .. } | ClientError::NotConnected
        )
    }

    /// Check if error is call-related
    pub fn is_call_error(&self) -> bool {
        matches!(
            self,
            ClientError::CallNotFound { .. }
                | ClientError::CallSetupFailed { .. }
                | ClientError::InvalidCallState { .. }
                | ClientError::TooManySessions { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::NotConnected
            | ClientError::AlreadyConnected { .. }
            | ClientError::AuthenticationFailed { .. } => "connection",

            ClientError::NetworkError { .. } | ClientError::ConnectionTimeout => "network",

            ClientError::CallNotFound { .. }
            | ClientError::CallSetupFailed { .. }
            | ClientError::InvalidCallState { .. }
            | ClientError::TooManySessions { .. } => "call",

            ClientError::MediaError { .. } => "media",

            ClientError::ProtocolError { .. } => "protocol",

            ClientError::GroupError { .. } => "group",

            ClientError::InvalidConfiguration { .. } | ClientError::MissingConfiguration { .. } => {
                "configuration"
            }

            ClientError::SessionManagerError { .. } => "session",

            ClientError::InternalError { .. } | ClientError::OperationTimeout { .. } => "system",
        }
    }
}

impl From<SessionError> for ClientError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::SignalingFailed(reason) => ClientError::NetworkError { reason },
            SessionError::InvalidConfiguration { field, reason } => {
                ClientError::InvalidConfiguration { field, reason }
            }
            SessionError::MissingCapability(capability) => ClientError::MediaError {
                details: format!("missing capability: {capability}"),
            },
            SessionError::MediaError(details) | SessionError::PeerConnection(details) => {
                ClientError::MediaError { details }
            }
            SessionError::MalformedSignal(reason) => ClientError::ProtocolError { reason },
            SessionError::SessionNotFound(session_id) => ClientError::CallNotFound {
                session_id: SessionId::from(session_id),
            },
            other => ClientError::SessionManagerError {
                reason: other.to_string(),
            },
        }
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(error: toml::de::Error) -> Self {
        ClientError::invalid_configuration("toml", error.to_string())
    }
}
