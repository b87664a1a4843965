//! Client-core: the application-facing peerlink client
//!
//! ## Layers
//! ```text
//! Client      connect/disconnect, endpoints and presence, groups, messages
//!   calls     start_call / start_direct_connection, inbound sessions via the router
//! session-core  Session orchestrator, CallState machine, SignalRouter
//! ```
//!
//! The signaling service is reached through [`ClientChannel`], which extends
//! session-core's `SignalingChannel`; the WebRTC stack through session-core's
//! `RtcPlatform`. Whatever the transport receives is fed back with
//! [`Client::handle_inbound`].

pub mod channel;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod group;

pub use channel::{ClientChannel, Credentials, Identity, InboundEvent, Message};
pub use client::{CallOptions, Client, ClientBuilder, ClientConfig, ClientStats};
pub use endpoint::{resolve_presence, Connection, Endpoint, EndpointRegistry, Presence, PresenceResolver};
pub use error::{ClientError, ClientResult};
pub use events::ClientEvent;
pub use group::{GroupId, GroupMember, GroupRegistry};

pub use peerlink_session_core::{
    AnswerOptions, CallStateName, ConnectionId, EndpointId, MediaConstraints, Session, SessionEvent,
    SessionId, SessionKind,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
