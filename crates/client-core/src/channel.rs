//! The client's view of the signaling service.
//!
//! [`ClientChannel`] extends session-core's [`SignalingChannel`] with the
//! account-level operations: connecting, authenticating, groups, messages and
//! presence. Whatever the transport receives is handed back to the client as an
//! [`InboundEvent`] through [`crate::Client::handle_inbound`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use peerlink_session_core::{
    ConnectionId, EndpointId, SessionResult, SignalEnvelope, SignalingChannel,
};

use crate::endpoint::Presence;
use crate::error::ClientResult;
use crate::group::{GroupId, GroupMember};

/// What the client presents when opening the signaling connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub endpoint_id: Option<EndpointId>,
    pub token: Option<String>,
    pub app_id: Option<String>,
}

impl Credentials {
    pub fn new(endpoint_id: impl Into<EndpointId>) -> Self {
        Self {
            endpoint_id: Some(endpoint_id.into()),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }
}

/// Who the service says we are once authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub endpoint_id: EndpointId,
    pub connection_id: ConnectionId,
}

/// A text message between endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_endpoint: Option<EndpointId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_connection: Option<ConnectionId>,
    pub to_endpoint: EndpointId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(to_endpoint: EndpointId, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_endpoint: None,
            from_connection: None,
            to_endpoint,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything the transport can hand to the client
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Signal(SignalEnvelope),
    Message(Message),
    Presence {
        endpoint_id: EndpointId,
        connection_id: ConnectionId,
        presence: Presence,
    },
    GroupJoined {
        group: GroupId,
        member: GroupMember,
    },
    GroupLeft {
        group: GroupId,
        member: GroupMember,
    },
    /// The service dropped the connection
    Closed { reason: Option<String> },
}

#[async_trait]
pub trait ClientChannel: SignalingChannel {
    async fn open(&self, credentials: &Credentials) -> ClientResult<()>;

    async fn authenticate(&self, credentials: &Credentials) -> ClientResult<Identity>;

    async fn close(&self) -> ClientResult<()>;

    async fn join_group(&self, group: &GroupId) -> ClientResult<()>;

    async fn leave_group(&self, group: &GroupId) -> ClientResult<()>;

    async fn get_group_members(&self, group: &GroupId) -> ClientResult<Vec<GroupMember>>;

    async fn send_message(&self, message: &Message) -> ClientResult<()>;

    async fn send_presence(&self, presence: &Presence) -> ClientResult<()>;
}

/// Hands a [`ClientChannel`] to sessions, which only need the signaling half.
pub(crate) struct SessionChannel(pub(crate) Arc<dyn ClientChannel>);

#[async_trait]
impl SignalingChannel for SessionChannel {
    async fn send_sdp(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.0.send_sdp(signal).await
    }

    async fn send_candidate(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.0.send_candidate(signal).await
    }

    async fn send_connected(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.0.send_connected(signal).await
    }

    async fn send_modify(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.0.send_modify(signal).await
    }

    async fn send_hangup(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.0.send_hangup(signal).await
    }
}
