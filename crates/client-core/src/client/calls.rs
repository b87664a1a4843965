//! Call operations for the client
//!
//! Outbound calls and direct connections are created here; inbound ones arrive
//! through [`super::Client::handle_signal`] and are announced with `call` /
//! `direct-connection` events.

use std::sync::Arc;
use tracing::info;

use peerlink_session_core::{
    AnswerOptions, ConnectionId, EndpointId, ListenerProbe, Session, SessionId, SessionKind,
    SessionParams,
};

use crate::error::{ClientError, ClientResult};

/// Options for an outbound session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Ring only this connection of the remote endpoint
    pub connection: Option<ConnectionId>,
    /// How the caller side answers itself
    pub answer: AnswerOptions,
}

impl CallOptions {
    pub fn to_connection(mut self, connection: impl Into<ConnectionId>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_answer(mut self, answer: AnswerOptions) -> Self {
        self.answer = answer;
        self
    }
}

impl super::Client {
    /// Start an audio/video call to `remote`
    pub fn start_call(&self, remote: EndpointId, options: Option<CallOptions>) -> ClientResult<Session> {
        self.start_session(SessionKind::Call, remote, options.unwrap_or_default())
    }

    /// Start a data-channel-only session to `remote`
    pub fn start_direct_connection(
        &self,
        remote: EndpointId,
        options: Option<CallOptions>,
    ) -> ClientResult<Session> {
        self.start_session(SessionKind::DirectConnection, remote, options.unwrap_or_default())
    }

    fn start_session(&self, kind: SessionKind, remote: EndpointId, options: CallOptions) -> ClientResult<Session> {
        let identity = self.require_identity()?;
        let limit = self.config().max_sessions;
        if self.directory().len() >= limit {
            return Err(ClientError::TooManySessions { limit });
        }

        let mut params = SessionParams::outgoing(kind, remote.clone())
            .with_local(Some(identity.endpoint_id), Some(identity.connection_id));
        if let Some(connection) = options.connection {
            params = params.with_remote_connection(connection);
        }

        let session = Session::new(params, self.session_deps())?;
        session.set_answer_options(options.answer);
        self.directory().insert(session.clone())?;
        self.get_endpoint(&remote);
        self.stats.lock().outbound_sessions += 1;

        info!(session = %session.id(), to = %remote, %kind, "starting session");
        let probe: Arc<dyn ListenerProbe> = self.events.clone();
        session.initiate(probe);
        Ok(session)
    }

    pub fn get_session(&self, id: &SessionId) -> ClientResult<Session> {
        self.directory()
            .get(id)
            .ok_or_else(|| ClientError::CallNotFound { session_id: id.clone() })
    }

    /// Every live session, inbound and outbound
    pub fn sessions(&self) -> Vec<Session> {
        self.directory().all()
    }

    pub fn sessions_with(&self, endpoint: &EndpointId) -> Vec<Session> {
        self.directory().by_endpoint(endpoint)
    }

    pub fn hangup(&self, id: &SessionId, reason: Option<String>) -> ClientResult<()> {
        self.get_session(id)?.hangup(reason);
        Ok(())
    }

    /// Hang up every live session with `reason`
    pub fn hangup_all(&self, reason: &str) {
        for session in self.sessions() {
            session.hangup(Some(reason.to_string()));
        }
    }
}
