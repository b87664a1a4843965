use crate::session::peer::LocalStream;
use crate::types::{EndpointId, MediaConstraints, SessionId};

/// Application-facing events fired by a [`super::Session`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A callee session is waiting to be answered
    Incoming {
        session_id: SessionId,
        remote_endpoint: EndpointId,
    },
    /// Local media is captured and waiting for `approve()`
    LocalMedia { stream: LocalStream },
    /// Media or data is flowing
    Connected,
    /// The remote party asked to renegotiate
    ModifyRequested { constraints: Option<MediaConstraints> },
    ModifyAccepted,
    ModifyRejected { reason: Option<String> },
    Error { message: String },
    /// Data received over a direct connection's data channel
    Message { message: serde_json::Value },
    /// The session ended. `sent_signal` tells whether a bye was delivered.
    Hangup { reason: String, sent_signal: bool },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Incoming { .. } => "incoming",
            SessionEvent::LocalMedia { .. } => "local-media",
            SessionEvent::Connected => "connect",
            SessionEvent::ModifyRequested { .. } => "modify",
            SessionEvent::ModifyAccepted => "modify-accepted",
            SessionEvent::ModifyRejected { .. } => "modify-rejected",
            SessionEvent::Error { .. } => "error",
            SessionEvent::Message { .. } => "message",
            SessionEvent::Hangup { .. } => "hangup",
        }
    }
}
