//! Platform WebRTC seams.
//!
//! The session never talks to a concrete WebRTC stack. It drives these traits,
//! and the platform reports transport events back through the `on_*` methods of
//! [`super::Session`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::SessionResult;
use crate::signaling::{IceCandidate, SessionDescription};
use crate::types::{MediaConstraints, SessionKind};

/// Handle to captured local media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStream {
    pub id: String,
    pub audio: bool,
    pub video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    /// States from which the transport will not recover
    pub fn is_fatal(&self) -> bool {
        matches!(self, IceConnectionState::Failed | IceConnectionState::Closed)
    }
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> SessionResult<SessionDescription>;

    async fn create_answer(&self) -> SessionResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> SessionResult<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> SessionResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()>;

    async fn add_local_stream(&self, stream: &LocalStream) -> SessionResult<()>;

    /// Open the data channel of a direct connection (caller side).
    async fn open_data_channel(&self, label: &str) -> SessionResult<()>;

    /// Send one text frame over the open data channel.
    async fn send_data(&self, data: &str) -> SessionResult<()>;

    /// Whether media or data currently flows over this connection
    fn has_media(&self) -> bool;

    async fn close(&self);
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Ask for device access. An error means access was denied or failed.
    async fn get_user_media(&self, constraints: &MediaConstraints) -> SessionResult<LocalStream>;

    async fn stop(&self, stream: &LocalStream);
}

/// Factory for the per-session platform objects
pub trait RtcPlatform: Send + Sync {
    fn create_peer_connection(&self, kind: SessionKind) -> SessionResult<Arc<dyn PeerConnection>>;

    /// Device access, when the platform has any
    fn media_devices(&self) -> Option<Arc<dyn MediaDevices>>;
}
