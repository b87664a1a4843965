//! Demultiplexes inbound signals by session id.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::directory::SessionDirectory;
use crate::errors::SessionResult;
use crate::events::ListenerProbe;
use crate::session::Session;
use crate::signaling::{SignalEnvelope, SignalType};

/// Creates the callee session for an inbound offer.
///
/// Returns the session together with the probe its `initiate` consults for
/// incoming-session listeners.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_incoming(
        &self,
        offer: &SignalEnvelope,
    ) -> SessionResult<(Session, Arc<dyn ListenerProbe>)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No session with this id and the signal is not an offer
    UnknownSession,
    Malformed(String),
    /// The factory could not build a session for the offer
    Rejected(String),
    /// Another session with this id appeared concurrently
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to an existing session
    Delivered,
    /// A new callee session was created from an offer
    Created,
    Dropped(DropReason),
}

pub struct SignalRouter {
    directory: Arc<SessionDirectory>,
    factory: Arc<dyn SessionFactory>,
}

impl SignalRouter {
    pub fn new(directory: Arc<SessionDirectory>, factory: Arc<dyn SessionFactory>) -> Self {
        Self { directory, factory }
    }

    pub fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    /// Parse a raw JSON signal and route it. Malformed input is dropped.
    pub async fn route_json(&self, json: &str) -> RouteOutcome {
        match SignalEnvelope::parse(json) {
            Ok(signal) => self.route(signal).await,
            Err(e) => {
                warn!(error = %e, "dropping malformed signal");
                RouteOutcome::Dropped(DropReason::Malformed(e.to_string()))
            }
        }
    }

    pub async fn route(&self, signal: SignalEnvelope) -> RouteOutcome {
        if let Some(session) = self.directory.get(&signal.session_id) {
            debug!(session = %signal.session_id, signal = %signal.signal_type, "routing signal");
            session.deliver(signal).await;
            return RouteOutcome::Delivered;
        }

        if signal.signal_type != SignalType::Offer {
            warn!(
                session = %signal.session_id,
                signal = %signal.signal_type,
                "dropping signal for unknown session"
            );
            return RouteOutcome::Dropped(DropReason::UnknownSession);
        }

        let (session, listeners) = match self.factory.create_incoming(&signal).await {
            Ok(created) => created,
            Err(e) => {
                warn!(session = %signal.session_id, error = %e, "could not create session for offer");
                return RouteOutcome::Dropped(DropReason::Rejected(e.to_string()));
            }
        };

        if self.directory.insert(session.clone()).is_err() {
            warn!(session = %signal.session_id, "session created concurrently, dropping offer");
            return RouteOutcome::Dropped(DropReason::Duplicate);
        }

        session.handle_offer(signal).await;
        session.initiate(listeners);
        RouteOutcome::Created
    }
}
