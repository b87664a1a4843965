//! Events fired by the [`crate::Client`].
//!
//! Listeners register by name through `Client::listen` / `Client::once`:
//!
//! | name                | event                                   |
//! |---------------------|-----------------------------------------|
//! | `connect`           | authenticated with the signaling service|
//! | `disconnect`        | the connection was closed               |
//! | `call`              | an inbound call is ringing              |
//! | `direct-connection` | an inbound direct connection is ringing |
//! | `message`           | a text message arrived                  |
//! | `presence`          | an endpoint's resolved presence changed |
//! | `join` / `leave`    | group membership changed                |
//!
//! Having no `call` (or `direct-connection`) listener makes inbound sessions
//! of that kind get rejected automatically.

use peerlink_session_core::{EndpointId, Session};

use crate::channel::{Identity, Message};
use crate::endpoint::Presence;
use crate::group::{GroupId, GroupMember};

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected {
        identity: Identity,
    },
    Disconnected {
        reason: Option<String>,
    },
    /// Inbound session waiting for `answer` or `reject`
    Incoming {
        session: Session,
    },
    Message {
        message: Message,
    },
    Presence {
        endpoint_id: EndpointId,
        presence: Presence,
    },
    Join {
        group: GroupId,
        member: GroupMember,
    },
    Leave {
        group: GroupId,
        member: GroupMember,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connected { .. } => "connect",
            ClientEvent::Disconnected { .. } => "disconnect",
            ClientEvent::Incoming { session } => session.kind().incoming_event_name(),
            ClientEvent::Message { .. } => "message",
            ClientEvent::Presence { .. } => "presence",
            ClientEvent::Join { .. } => "join",
            ClientEvent::Leave { .. } => "leave",
        }
    }

    /// The inbound session carried by `call` / `direct-connection` events
    pub fn session(&self) -> Option<&Session> {
        match self {
            ClientEvent::Incoming { session } => Some(session),
            _ => None,
        }
    }
}
