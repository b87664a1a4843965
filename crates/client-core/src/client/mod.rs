//! High-level peerlink client
//!
//! The client module is organized into several sub-modules:
//!
//! - **`config`** - [`ClientConfig`], loadable from TOML
//! - **`builder`** - [`ClientBuilder`] for assembling a client with its channel and platform
//! - **`calls`** - starting and looking up calls and direct connections
//! - **`messaging`** - presence, text messages and groups
//!
//! # Basic Call Flow
//!
//! ```rust,no_run
//! # use peerlink_client_core::{ClientBuilder, ClientChannel, ClientEvent, Credentials};
//! # use peerlink_session_core::{AnswerOptions, RtcPlatform};
//! # use std::sync::Arc;
//! # async fn example(channel: Arc<dyn ClientChannel>, platform: Arc<dyn RtcPlatform>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::new()
//!     .channel(channel)
//!     .platform(platform)
//!     .build()?;
//!
//! client.listen("call", |event| {
//!     if let Some(session) = event.session() {
//!         session.answer(AnswerOptions::default());
//!     }
//! });
//!
//! client.connect(Credentials::new("alice")).await?;
//! let session = client.start_call("bob".into(), None)?;
//! println!("calling bob, session {}", session.id());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod calls;
pub mod config;
pub mod messaging;

pub use builder::ClientBuilder;
pub use calls::CallOptions;
pub use config::ClientConfig;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use peerlink_session_core::{
    EndpointId, EventEmitter, ListenerId, ListenerProbe, RouteOutcome, RtcPlatform, Session,
    SessionDeps, SessionDirectory, SessionError, SessionFactory, SessionParams, SessionResult,
    SignalEnvelope, SignalRouter,
};

use crate::channel::{ClientChannel, Credentials, Identity, InboundEvent, SessionChannel};
use crate::endpoint::{Endpoint, EndpointRegistry, PresenceResolver};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::group::GroupRegistry;

/// Counters describing what the client has done since it was created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub connected: bool,
    pub outbound_sessions: usize,
    pub inbound_sessions: usize,
    pub active_sessions: usize,
    pub messages_sent: usize,
    pub messages_received: usize,
}

pub struct Client {
    config: ClientConfig,
    channel: Arc<dyn ClientChannel>,
    platform: Arc<dyn RtcPlatform>,
    identity: RwLock<Option<Identity>>,
    directory: Arc<SessionDirectory>,
    router: SignalRouter,
    endpoints: EndpointRegistry,
    groups: GroupRegistry,
    events: Arc<EventEmitter<ClientEvent>>,
    stats: Mutex<ClientStats>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &*self.identity.read())
            .field("sessions", &self.directory.len())
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

/// Creates callee sessions for the router on behalf of the client
struct InboundSessions {
    client: Weak<Client>,
}

#[async_trait]
impl SessionFactory for InboundSessions {
    async fn create_incoming(
        &self,
        offer: &SignalEnvelope,
    ) -> SessionResult<(Session, Arc<dyn ListenerProbe>)> {
        let client = self
            .client
            .upgrade()
            .ok_or_else(|| SessionError::InvalidState("client dropped".into()))?;
        client.create_incoming(offer)
    }
}

impl Client {
    pub fn new(
        config: ClientConfig,
        channel: Arc<dyn ClientChannel>,
        platform: Arc<dyn RtcPlatform>,
        resolver: Option<PresenceResolver>,
    ) -> ClientResult<Arc<Self>> {
        config.validate()?;
        let directory = Arc::new(SessionDirectory::new());

        Ok(Arc::new_cyclic(|weak| {
            let factory = Arc::new(InboundSessions {
                client: weak.clone(),
            });
            Client {
                config,
                channel,
                platform,
                identity: RwLock::new(None),
                router: SignalRouter::new(Arc::clone(&directory), factory),
                directory,
                endpoints: EndpointRegistry::new(resolver),
                groups: GroupRegistry::new(),
                events: Arc::new(EventEmitter::new()),
                stats: Mutex::new(ClientStats::default()),
            }
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---- connection lifecycle ----

    /// Open the signaling connection and authenticate. Fires `connect`.
    pub async fn connect(&self, credentials: Credentials) -> ClientResult<Identity> {
        if let Some(identity) = self.identity() {
            return Err(ClientError::AlreadyConnected {
                endpoint: identity.endpoint_id.to_string(),
            });
        }

        let mut credentials = credentials;
        if credentials.app_id.is_none() {
            credentials.app_id = self.config.app_id.clone();
        }

        let timeout_ms = self.config.connect_timeout_ms;
        let handshake = async {
            self.channel.open(&credentials).await?;
            self.channel.authenticate(&credentials).await
        };
        let identity = tokio::time::timeout(Duration::from_millis(timeout_ms), handshake)
            .await
            .map_err(|_| ClientError::OperationTimeout {
                duration_ms: timeout_ms,
            })??;

        *self.identity.write() = Some(identity.clone());
        self.stats.lock().connected = true;
        info!(endpoint = %identity.endpoint_id, connection = %identity.connection_id, "client connected");

        self.fire(ClientEvent::Connected {
            identity: identity.clone(),
        });
        Ok(identity)
    }

    /// Hang up every session, close the signaling connection and forget
    /// endpoints and groups. Fires `disconnect`.
    pub async fn disconnect(&self) -> ClientResult<()> {
        if self.identity().is_none() {
            debug!("disconnect while not connected");
            return Ok(());
        }
        self.hangup_all("client disconnected");
        let closed = self.channel.close().await;
        if let Err(e) = &closed {
            warn!(error = %e, "error closing signaling channel");
        }
        self.reset(None);
        closed
    }

    fn reset(&self, reason: Option<String>) {
        if self.identity.write().take().is_none() {
            return;
        }
        self.endpoints.clear();
        self.groups.clear();
        self.stats.lock().connected = false;
        info!(reason = reason.as_deref().unwrap_or("none"), "client disconnected");
        self.fire(ClientEvent::Disconnected { reason });
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.identity.read().is_some()
    }

    pub(crate) fn require_identity(&self) -> ClientResult<Identity> {
        self.identity().ok_or(ClientError::NotConnected)
    }

    // ---- inbound traffic ----

    /// Feed one event received by the transport into the client.
    pub async fn handle_inbound(&self, event: InboundEvent) {
        match event {
            InboundEvent::Signal(signal) => {
                self.handle_signal(signal).await;
            }
            InboundEvent::Message(message) => {
                self.stats.lock().messages_received += 1;
                self.fire(ClientEvent::Message { message });
            }
            InboundEvent::Presence {
                endpoint_id,
                connection_id,
                presence,
            } => {
                let endpoint = self.endpoints.get_or_create(&endpoint_id);
                let before = endpoint.presence();
                let after = endpoint.update_presence(connection_id, presence);
                if before != after {
                    debug!(endpoint = %endpoint_id, presence = %after, "presence changed");
                    self.fire(ClientEvent::Presence {
                        endpoint_id,
                        presence: after,
                    });
                }
            }
            InboundEvent::GroupJoined { group, member } => {
                if self.groups.add_member(&group, member.clone()) {
                    self.fire(ClientEvent::Join { group, member });
                }
            }
            InboundEvent::GroupLeft { group, member } => {
                if self.groups.remove_member(&group, &member) {
                    self.fire(ClientEvent::Leave { group, member });
                }
            }
            InboundEvent::Closed { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("none"), "signaling connection closed by service");
                self.hangup_all("signaling connection closed");
                self.reset(reason);
            }
        }
    }

    pub async fn handle_signal(&self, signal: SignalEnvelope) -> RouteOutcome {
        self.router.route(signal).await
    }

    pub async fn handle_signal_json(&self, json: &str) -> RouteOutcome {
        self.router.route_json(json).await
    }

    // ---- events ----

    pub fn listen<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.events.listen(event, callback)
    }

    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.events.once(event, callback)
    }

    pub fn ignore(&self, event: &str, id: ListenerId) -> bool {
        self.events.ignore(event, id)
    }

    pub(crate) fn fire(&self, event: ClientEvent) {
        self.events.fire(event.name(), &event);
    }

    // ---- endpoints ----

    /// The endpoint record for `id`, created on first use
    pub fn get_endpoint(&self, id: &EndpointId) -> Arc<Endpoint> {
        self.endpoints.get_or_create(id)
    }

    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.all()
    }

    pub fn stats(&self) -> ClientStats {
        let mut stats = self.stats.lock().clone();
        stats.active_sessions = self.directory.len();
        stats
    }

    // ---- session plumbing ----

    pub(crate) fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            channel: Arc::new(SessionChannel(Arc::clone(&self.channel))),
            platform: Arc::clone(&self.platform),
            directory: Arc::downgrade(&self.directory),
            config: self.config.session.clone(),
        }
    }

    pub(crate) fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    fn create_incoming(
        &self,
        offer: &SignalEnvelope,
    ) -> SessionResult<(Session, Arc<dyn ListenerProbe>)> {
        let identity = self
            .identity()
            .ok_or_else(|| SessionError::InvalidState("client not connected".into()))?;
        if self.directory.len() >= self.config.max_sessions {
            return Err(SessionError::InvalidState(format!(
                "session limit of {} reached",
                self.config.max_sessions
            )));
        }

        let mut params = SessionParams::incoming(offer)?;
        if params.local_endpoint.is_none() {
            params.local_endpoint = Some(identity.endpoint_id);
        }
        if params.local_connection.is_none() {
            params.local_connection = Some(identity.connection_id);
        }
        let session = Session::new(params, self.session_deps())?;
        self.endpoints.get_or_create(session.remote_endpoint());
        self.stats.lock().inbound_sessions += 1;

        // Ring through the client once the session asks to be answered.
        let events = Arc::clone(&self.events);
        let directory = Arc::downgrade(&self.directory);
        session.listen("incoming", move |event| {
            let peerlink_session_core::SessionEvent::Incoming { session_id, .. } = event else {
                return;
            };
            let Some(session) = directory.upgrade().and_then(|d| d.get(session_id)) else {
                return;
            };
            let ringing = ClientEvent::Incoming { session };
            events.fire(ringing.name(), &ringing);
        });

        info!(session = %session.id(), from = %session.remote_endpoint(), kind = %session.kind(), "inbound session");
        let probe: Arc<dyn ListenerProbe> = self.events.clone();
        Ok((session, probe))
    }
}
