//! Call / direct-connection orchestrator.
//!
//! A `Session` binds one [`CallState`] to a peer connection, optional local
//! media and the signaling channel. State entries trigger the WebRTC and
//! signaling work on spawned tasks; inbound signals and transport events are
//! translated back into dispatches.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use super::candidates::{CandidateQueues, RelayPolicy};
use super::config::SessionConfig;
use super::events::SessionEvent;
use super::peer::{IceConnectionState, LocalStream, MediaDevices, PeerConnection, RtcPlatform};
use crate::errors::{SessionError, SessionResult};
use crate::events::{EventEmitter, ListenerId, ListenerProbe};
use crate::router::SessionDirectory;
use crate::signaling::{
    IceCandidate, ModifyAction, SessionDescription, SignalEnvelope, SignalType, SignalingChannel,
};
use crate::state_machine::{CallState, StateEvent};
use crate::state_table::{CallEvent, CallStateName};
use crate::types::{ConnectionId, EndpointId, MediaConstraints, SessionId, SessionKind};

/// Identity and role of a session, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub id: SessionId,
    pub kind: SessionKind,
    pub caller: bool,
    pub local_endpoint: Option<EndpointId>,
    pub local_connection: Option<ConnectionId>,
    pub remote_endpoint: EndpointId,
    /// Known up front when calling a specific connection, otherwise bound by the answer
    pub remote_connection: Option<ConnectionId>,
}

impl SessionParams {
    /// Parameters for a session this side initiates
    pub fn outgoing(kind: SessionKind, remote_endpoint: EndpointId) -> Self {
        Self {
            id: SessionId::new(),
            kind,
            caller: true,
            local_endpoint: None,
            local_connection: None,
            remote_endpoint,
            remote_connection: None,
        }
    }

    /// Parameters for the callee side of an inbound offer
    pub fn incoming(offer: &SignalEnvelope) -> SessionResult<Self> {
        let remote_endpoint = offer
            .from_endpoint
            .clone()
            .ok_or_else(|| SessionError::malformed("offer without fromEndpoint"))?;
        Ok(Self {
            id: offer.session_id.clone(),
            kind: offer.session_kind(),
            caller: false,
            local_endpoint: offer.to_endpoint.clone(),
            local_connection: offer.to_connection.clone(),
            remote_endpoint,
            remote_connection: offer.from_connection.clone(),
        })
    }

    pub fn with_local(mut self, endpoint: Option<EndpointId>, connection: Option<ConnectionId>) -> Self {
        self.local_endpoint = endpoint;
        self.local_connection = connection;
        self
    }

    pub fn with_remote_connection(mut self, connection: ConnectionId) -> Self {
        self.remote_connection = Some(connection);
        self
    }
}

/// Collaborators handed to a session at construction
#[derive(Clone)]
pub struct SessionDeps {
    pub channel: Arc<dyn SignalingChannel>,
    pub platform: Arc<dyn RtcPlatform>,
    pub directory: Weak<SessionDirectory>,
    pub config: SessionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerOptions {
    /// Hold the session after device access until `approve()` is called
    pub preview_local_media: bool,
    pub constraints: Option<MediaConstraints>,
}

#[derive(Default)]
struct Negotiation {
    remote_connection: Option<ConnectionId>,
    pending_offer: Option<SessionDescription>,
    remote_description_set: bool,
    candidates: CandidateQueues,
    local_stream: Option<LocalStream>,
    constraints: MediaConstraints,
    preview_local_media: bool,
    awaiting_local_approval: bool,
    modify_pending: bool,
    modify_constraints: Option<MediaConstraints>,
    sdp_sent: bool,
    sent_connected: bool,
    /// Do not send a bye on teardown
    suppress_bye: bool,
    incoming_announced: bool,
    torn_down: bool,
}

struct SessionInner {
    params: SessionParams,
    config: SessionConfig,
    relay_policy: RelayPolicy,
    state: CallState,
    peer: Arc<dyn PeerConnection>,
    media: Option<Arc<dyn MediaDevices>>,
    channel: Arc<dyn SignalingChannel>,
    directory: Weak<SessionDirectory>,
    events: EventEmitter<SessionEvent>,
    negotiation: Mutex<Negotiation>,
}

/// Handle to one call or direct connection. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.params.id)
            .field("kind", &self.inner.params.kind)
            .field("caller", &self.inner.params.caller)
            .field("state", &self.inner.state.current_state())
            .finish()
    }
}

impl Session {
    /// Create a session bound to the current tokio runtime. Entry actions and
    /// timers run there.
    pub fn new(params: SessionParams, deps: SessionDeps) -> SessionResult<Self> {
        deps.config.validate()?;

        let peer = deps.platform.create_peer_connection(params.kind)?;
        let media = deps.platform.media_devices();
        let media_peer = Arc::clone(&peer);
        let state = CallState::builder()
            .caller(params.caller)
            .kind(params.kind)
            .timeouts(deps.config.timeouts)
            .label(params.id.to_string())
            .has_media(move || media_peer.has_media())
            .build()?;

        let negotiation = Negotiation {
            remote_connection: params.remote_connection.clone(),
            constraints: deps.config.constraints,
            ..Default::default()
        };

        let inner = Arc::new(SessionInner {
            relay_policy: RelayPolicy::from_flags(deps.config.force_turn, deps.config.disable_turn),
            params,
            config: deps.config,
            state,
            peer,
            media,
            channel: deps.channel,
            directory: deps.directory,
            events: EventEmitter::new(),
            negotiation: Mutex::new(negotiation),
        });
        Self::wire(&inner);

        debug!(session = %inner.params.id, kind = %inner.params.kind, caller = inner.params.caller, "session created");
        Ok(Session { inner })
    }

    fn wire(inner: &Arc<SessionInner>) {
        on_entry(inner, CallStateName::Preparing, |s, e| async move { s.enter_preparing(e).await });
        on_entry(inner, CallStateName::ApprovingDeviceAccess, |s, _| async move {
            s.enter_approving_device_access().await
        });
        on_entry(inner, CallStateName::Offering, |s, _| async move { s.enter_offering().await });
        on_entry(inner, CallStateName::Connecting, |s, _| async move { s.enter_connecting().await });
        on_entry(inner, CallStateName::Connected, |s, e| async move { s.enter_connected(e) });
        on_entry(inner, CallStateName::Modifying, |s, _| async move { s.enter_modifying().await });
        on_entry(inner, CallStateName::Terminated, |s, _| async move { s.teardown().await });
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.params.id
    }

    pub fn kind(&self) -> SessionKind {
        self.inner.params.kind
    }

    /// Role the session was created with
    pub fn is_caller(&self) -> bool {
        self.inner.params.caller
    }

    pub fn params(&self) -> &SessionParams {
        &self.inner.params
    }

    pub fn call_state(&self) -> &CallState {
        &self.inner.state
    }

    pub fn current_state(&self) -> CallStateName {
        self.inner.state.current_state()
    }

    pub fn is_state(&self, state: CallStateName) -> bool {
        self.inner.state.is_state(state)
    }

    pub fn remote_endpoint(&self) -> &EndpointId {
        &self.inner.params.remote_endpoint
    }

    pub fn remote_connection(&self) -> Option<ConnectionId> {
        self.inner.negotiation.lock().remote_connection.clone()
    }

    pub fn local_stream(&self) -> Option<LocalStream> {
        self.inner.negotiation.lock().local_stream.clone()
    }

    pub fn listen<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.listen(event, callback)
    }

    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.once(event, callback)
    }

    pub fn ignore(&self, event: &str, id: ListenerId) -> bool {
        self.inner.events.ignore(event, id)
    }

    fn fire(&self, event: SessionEvent) {
        self.inner.events.fire(event.name(), &event);
    }

    // ---- application operations ----

    /// Set the answer options the caller side uses when it answers itself.
    pub fn set_answer_options(&self, options: AnswerOptions) {
        let mut n = self.inner.negotiation.lock();
        n.preview_local_media = options.preview_local_media;
        if let Some(constraints) = options.constraints {
            n.constraints = constraints;
        }
    }

    /// Start the session. `listeners` decides whether an inbound session has anyone to ring.
    pub fn initiate(&self, listeners: Arc<dyn ListenerProbe>) {
        self.inner.state.dispatch(CallEvent::Initiate { listeners });
    }

    pub fn answer(&self, options: AnswerOptions) {
        let preview_local_media = options.preview_local_media;
        self.set_answer_options(options);
        self.inner.state.dispatch(CallEvent::Answer { preview_local_media });
    }

    /// Approve sending local media. While previewing this releases the held media.
    pub fn approve(&self) {
        let release = std::mem::take(&mut self.inner.negotiation.lock().awaiting_local_approval);
        if release {
            self.inner.state.dispatch(CallEvent::ReceiveLocalMedia);
        } else {
            self.inner.state.dispatch(CallEvent::Approve);
        }
    }

    /// Decline the session, or a renegotiation requested by the remote party.
    /// If the refusal of a renegotiation cannot be sent, the session ends.
    pub async fn reject(&self, reason: Option<String>) {
        if self.is_state(CallStateName::Modifying) && self.inner.state.modify_received() {
            let mut signal = self.envelope(SignalType::Modify).with_action(ModifyAction::Reject);
            if let Some(reason) = &reason {
                signal = signal.with_reason(reason.clone());
            }
            if let Err(e) = self.inner.channel.send_modify(signal).await {
                return self.fail(e);
            }
        }
        self.inner.state.dispatch(CallEvent::Reject { reason });
    }

    pub fn hangup(&self, reason: Option<String>) {
        self.inner.state.dispatch(CallEvent::Hangup {
            reason,
            received_bye: false,
        });
    }

    /// Ask the remote party to renegotiate media.
    pub fn modify(&self, constraints: MediaConstraints) -> SessionResult<()> {
        if !self.is_state(CallStateName::Connected) {
            return Err(SessionError::InvalidState(format!(
                "cannot modify while {}",
                self.current_state()
            )));
        }
        {
            let mut n = self.inner.negotiation.lock();
            n.modify_constraints = Some(constraints);
            n.constraints = constraints;
        }
        self.inner.state.dispatch(CallEvent::Modify { receive: false });
        Ok(())
    }

    /// Accept a renegotiation requested by the remote party.
    pub async fn accept(&self) {
        if !self.is_state(CallStateName::Modifying) || !self.inner.state.modify_received() {
            debug!(session = %self.id(), "no renegotiation to accept");
            return;
        }
        let signal = self.envelope(SignalType::Modify).with_action(ModifyAction::Accept);
        if let Err(e) = self.inner.channel.send_modify(signal).await {
            return self.fail(e);
        }
        self.inner.state.dispatch(CallEvent::Accept);
        self.fire(SessionEvent::ModifyAccepted);
    }

    /// Send `text` to the remote party of a connected direct connection,
    /// wrapped as `{"message": text}`.
    pub async fn send_message(&self, text: impl Into<String>) -> SessionResult<()> {
        self.send_object(serde_json::json!({ "message": text.into() })).await
    }

    /// Send an arbitrary JSON value over the data channel of a connected direct connection.
    pub async fn send_object(&self, object: serde_json::Value) -> SessionResult<()> {
        if !self.kind().is_direct_connection() {
            return Err(SessionError::InvalidState("only direct connections carry data".into()));
        }
        if !self.is_state(CallStateName::Connected) {
            return Err(SessionError::InvalidState(format!(
                "cannot send data while {}",
                self.current_state()
            )));
        }
        self.inner.peer.send_data(&object.to_string()).await
    }

    // ---- inbound signaling ----

    /// Hand an inbound signal for this session to the matching handler.
    pub async fn deliver(&self, signal: SignalEnvelope) {
        if signal.session_kind() != self.kind() {
            debug!(session = %self.id(), target = ?signal.target, "signal target does not match session kind");
        }
        match signal.signal_type {
            SignalType::Offer => self.handle_offer(signal).await,
            SignalType::Answer => self.handle_answer(signal).await,
            SignalType::Candidate => self.handle_candidates(signal).await,
            SignalType::Connected => self.handle_connected(signal),
            SignalType::Modify => self.handle_modify(signal).await,
            SignalType::Bye => self.handle_bye(signal),
        }
    }

    pub async fn handle_offer(&self, signal: SignalEnvelope) {
        let Some(offer) = signal.session_description else {
            warn!(session = %self.id(), "offer without session description");
            return;
        };
        {
            let mut n = self.inner.negotiation.lock();
            if n.remote_connection.is_none() {
                n.remote_connection = signal.from_connection;
            }
            n.pending_offer = Some(offer);
        }
        if self.is_state(CallStateName::Connecting) && !self.inner.state.caller() {
            self.process_offer().await;
        }
    }

    pub async fn handle_answer(&self, signal: SignalEnvelope) {
        if !self.inner.state.caller() || !self.is_state(CallStateName::Offering) {
            debug!(session = %self.id(), state = %self.current_state(), "ignoring unexpected answer");
            return;
        }
        let Some(answer) = signal.session_description else {
            warn!(session = %self.id(), "answer without session description");
            return;
        };

        let send_connected = {
            let mut n = self.inner.negotiation.lock();
            if n.remote_connection.is_none() {
                n.remote_connection = signal.from_connection.clone();
            }
            let first = self.inner.params.caller && !n.sent_connected;
            n.sent_connected = true;
            first
        };

        if send_connected {
            let mut connected = self.envelope(SignalType::Connected);
            if let Some(winner) = signal.from_connection {
                connected = connected.with_connection_id(winner);
            }
            if let Err(e) = self.inner.channel.send_connected(connected).await {
                return self.fail(e);
            }
        }

        if let Err(e) = self.inner.peer.set_remote_description(answer).await {
            return self.fail(e);
        }
        let queued = {
            let mut n = self.inner.negotiation.lock();
            n.remote_description_set = true;
            n.candidates.take_inbound()
        };
        self.inner.state.dispatch(CallEvent::ReceiveAnswer);
        self.add_remote_candidates(queued).await;
    }

    pub async fn handle_candidates(&self, signal: SignalEnvelope) {
        let ready = {
            let mut n = self.inner.negotiation.lock();
            if !n.remote_description_set {
                for candidate in &signal.ice_candidates {
                    n.candidates.queue_inbound(candidate.clone());
                }
            }
            n.remote_description_set
        };
        if ready {
            self.add_remote_candidates(signal.ice_candidates).await;
        } else {
            debug!(session = %self.id(), count = signal.ice_candidates.len(), "queued remote candidates");
        }
    }

    /// A callee learns which connection won the call.
    pub fn handle_connected(&self, signal: SignalEnvelope) {
        if self.inner.state.caller() {
            return;
        }
        match (&signal.connection_id, &self.inner.params.local_connection) {
            (Some(winner), Some(ours)) if winner != ours => {
                info!(session = %self.id(), %winner, "call answered by another connection");
                self.inner.negotiation.lock().suppress_bye = true;
                self.hangup(Some("call answered elsewhere".to_string()));
            }
            _ => debug!(session = %self.id(), "this connection won the call"),
        }
    }

    pub async fn handle_modify(&self, signal: SignalEnvelope) {
        match signal.action {
            Some(ModifyAction::Initiate) => {
                let glare = self.inner.negotiation.lock().modify_pending;
                if glare || !self.is_state(CallStateName::Connected) {
                    let reason = if glare { "modify already in progress" } else { "not connected" };
                    info!(session = %self.id(), reason, "rejecting remote modify");
                    let reply = self
                        .envelope(SignalType::Modify)
                        .with_action(ModifyAction::Reject)
                        .with_reason(reason);
                    if let Err(e) = self.inner.channel.send_modify(reply).await {
                        self.fail(e);
                    }
                    return;
                }
                {
                    let mut n = self.inner.negotiation.lock();
                    n.modify_constraints = signal.constraints;
                    if let Some(constraints) = signal.constraints {
                        n.constraints = constraints;
                    }
                }
                self.inner.state.dispatch(CallEvent::Modify { receive: true });
            }
            Some(ModifyAction::Accept) => {
                let pending = std::mem::take(&mut self.inner.negotiation.lock().modify_pending);
                if !pending || !self.is_state(CallStateName::Modifying) {
                    debug!(session = %self.id(), "ignoring modify accept without pending modify");
                    return;
                }
                self.inner.state.dispatch(CallEvent::Accept);
                self.fire(SessionEvent::ModifyAccepted);
            }
            Some(ModifyAction::Reject) => {
                self.inner.negotiation.lock().modify_pending = false;
                if self.is_state(CallStateName::Modifying) {
                    self.inner.state.dispatch(CallEvent::Reject {
                        reason: signal.reason.clone(),
                    });
                    self.fire(SessionEvent::ModifyRejected {
                        reason: signal.reason,
                    });
                }
            }
            None => warn!(session = %self.id(), "modify signal without action"),
        }
    }

    pub fn handle_bye(&self, signal: SignalEnvelope) {
        let bound = self.inner.negotiation.lock().remote_connection.clone();
        if let (Some(bound), Some(from)) = (bound, signal.from_connection.as_ref()) {
            if &bound != from {
                debug!(session = %self.id(), %from, "ignoring bye from another connection");
                return;
            }
        }
        self.inner.state.dispatch(CallEvent::Hangup {
            reason: Some(signal.reason.unwrap_or_else(|| "remote hangup".to_string())),
            received_bye: true,
        });
    }

    // ---- transport events from the platform ----

    pub async fn on_local_candidate(&self, candidate: IceCandidate) {
        if !self.inner.relay_policy.permits(&candidate) {
            debug!(session = %self.id(), "dropping candidate filtered by relay policy");
            return;
        }
        if self.is_state(CallStateName::Terminated) {
            return;
        }
        let flags = self.inner.state.flags();
        if flags.sent_sdp || flags.processed_remote_sdp {
            let signal = self.envelope(SignalType::Candidate).with_candidates(vec![candidate]);
            if let Err(e) = self.inner.channel.send_candidate(signal).await {
                self.fail(e);
            }
        } else {
            self.inner.negotiation.lock().candidates.queue_outbound(candidate);
        }
    }

    pub fn on_remote_media(&self) {
        self.inner.state.dispatch(CallEvent::ReceiveRemoteMedia);
    }

    pub fn on_data_channel_open(&self) {
        self.inner.state.dispatch(CallEvent::ReceiveRemoteMedia);
    }

    /// A data channel frame arrived. JSON payloads are decoded, anything else
    /// is delivered as a string.
    pub fn on_data_channel_message(&self, data: &str) {
        let message = serde_json::from_str(data)
            .unwrap_or_else(|_| serde_json::Value::String(data.to_string()));
        self.fire(SessionEvent::Message { message });
    }

    pub fn on_data_channel_close(&self) {
        self.hangup(Some("data channel closed".to_string()));
    }

    pub fn on_ice_connection_state(&self, ice_state: IceConnectionState) {
        debug!(session = %self.id(), ?ice_state, "ice connection state changed");
        if ice_state.is_fatal() {
            self.hangup(Some(format!("ice connection {:?}", ice_state).to_lowercase()));
        }
    }

    // ---- state entry actions ----

    async fn enter_preparing(&self, event: StateEvent) {
        if !self.is_state(CallStateName::Preparing) {
            return;
        }
        let renegotiating = event.previous == Some(CallStateName::Modifying);
        if self.inner.state.caller() || renegotiating {
            let preview_local_media = !renegotiating && self.inner.negotiation.lock().preview_local_media;
            self.inner.state.dispatch(CallEvent::Answer { preview_local_media });
            return;
        }

        let announce = !std::mem::replace(&mut self.inner.negotiation.lock().incoming_announced, true);
        if announce {
            self.fire(SessionEvent::Incoming {
                session_id: self.id().clone(),
                remote_endpoint: self.remote_endpoint().clone(),
            });
        }
    }

    async fn enter_approving_device_access(&self) {
        if !self.is_state(CallStateName::ApprovingDeviceAccess) {
            return;
        }
        let (constraints, preview) = {
            let n = self.inner.negotiation.lock();
            (n.constraints, n.preview_local_media)
        };

        if self.kind() == SessionKind::Call {
            let stream = match &self.inner.media {
                Some(media) => media.get_user_media(&constraints).await,
                None => Err(SessionError::MediaError("no media devices available".into())),
            };
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(session = %self.id(), error = %e, "device access failed");
                    self.fire(SessionEvent::Error {
                        message: e.to_string(),
                    });
                    self.inner.state.dispatch(CallEvent::reject("media access denied"));
                    return;
                }
            };

            if !self.is_state(CallStateName::ApprovingDeviceAccess) {
                if let Some(media) = &self.inner.media {
                    media.stop(&stream).await;
                }
                return;
            }
            if let Err(e) = self.inner.peer.add_local_stream(&stream).await {
                return self.fail(e);
            }
            let replaced = self.inner.negotiation.lock().local_stream.replace(stream.clone());
            if let (Some(old), Some(media)) = (replaced, &self.inner.media) {
                media.stop(&old).await;
            }

            self.inner.state.dispatch(CallEvent::Approve);
            if preview {
                self.inner.negotiation.lock().awaiting_local_approval = true;
                self.fire(SessionEvent::LocalMedia { stream });
            } else {
                self.inner.state.dispatch(CallEvent::ReceiveLocalMedia);
            }
        } else {
            self.inner.state.dispatch(CallEvent::Approve);
            if preview {
                self.inner.negotiation.lock().awaiting_local_approval = true;
            } else {
                self.inner.state.dispatch(CallEvent::ReceiveLocalMedia);
            }
        }
    }

    async fn enter_offering(&self) {
        if !self.is_state(CallStateName::Offering) {
            return;
        }
        if self.kind().is_direct_connection() {
            if let Err(e) = self
                .inner
                .peer
                .open_data_channel(&self.inner.config.data_channel_label)
                .await
            {
                return self.fail(e);
            }
        }

        let offer = match self.inner.peer.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.inner.peer.set_local_description(offer.clone()).await {
            return self.fail(e);
        }
        if !self.is_state(CallStateName::Offering) {
            return;
        }

        let signal = self.envelope(SignalType::Offer).with_session_description(offer);
        if let Err(e) = self.inner.channel.send_sdp(signal).await {
            return self.fail(e);
        }
        self.inner.negotiation.lock().sdp_sent = true;
        self.inner.state.dispatch(CallEvent::SentOffer);
        self.flush_local_candidates().await;
    }

    async fn enter_connecting(&self) {
        if !self.inner.state.caller() {
            self.process_offer().await;
        }
    }

    fn enter_connected(&self, event: StateEvent) {
        if event.previous == Some(CallStateName::Connecting) {
            self.fire(SessionEvent::Connected);
        }
    }

    async fn enter_modifying(&self) {
        if !self.is_state(CallStateName::Modifying) {
            return;
        }
        let constraints = self.inner.negotiation.lock().modify_constraints;
        if self.inner.state.modify_received() {
            if self.inner.events.has_listeners("modify") {
                self.fire(SessionEvent::ModifyRequested { constraints });
            } else {
                self.accept().await;
            }
            return;
        }

        self.inner.negotiation.lock().modify_pending = true;
        let mut signal = self.envelope(SignalType::Modify).with_action(ModifyAction::Initiate);
        if let Some(constraints) = constraints {
            signal = signal.with_constraints(constraints);
        }
        if let Err(e) = self.inner.channel.send_modify(signal).await {
            self.fail(e);
        }
    }

    async fn teardown(&self) {
        let (stream, suppress_bye, sdp_sent) = {
            let mut n = self.inner.negotiation.lock();
            if n.torn_down {
                return;
            }
            n.torn_down = true;
            n.candidates.clear();
            n.pending_offer = None;
            (n.local_stream.take(), n.suppress_bye, n.sdp_sent)
        };

        if let (Some(stream), Some(media)) = (stream, &self.inner.media) {
            media.stop(&stream).await;
        }
        self.inner.peer.close().await;

        let flags = self.inner.state.flags();
        let reason = flags.hangup_reason.clone().unwrap_or_else(|| "none".to_string());
        // A caller that never sent its offer has nobody to tell.
        let send_bye = !flags.received_bye && !suppress_bye && (!self.is_caller() || sdp_sent);

        let mut sent_signal = false;
        if send_bye {
            let bye = self.envelope(SignalType::Bye).with_reason(reason.clone());
            match self.inner.channel.send_hangup(bye).await {
                Ok(()) => sent_signal = true,
                Err(e) => warn!(session = %self.id(), error = %e, "failed to send bye"),
            }
        }

        info!(session = %self.id(), %reason, sent_signal, "session terminated");
        self.fire(SessionEvent::Hangup {
            reason,
            sent_signal,
        });

        if let Some(directory) = self.inner.directory.upgrade() {
            directory.remove(self.id());
        }
    }

    // ---- helpers ----

    async fn process_offer(&self) {
        let Some(offer) = self.inner.negotiation.lock().pending_offer.take() else {
            return;
        };

        if let Err(e) = self.inner.peer.set_remote_description(offer).await {
            return self.fail(e);
        }
        let queued = {
            let mut n = self.inner.negotiation.lock();
            n.remote_description_set = true;
            n.candidates.take_inbound()
        };
        self.add_remote_candidates(queued).await;

        let answer = match self.inner.peer.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.inner.peer.set_local_description(answer.clone()).await {
            return self.fail(e);
        }
        self.inner.state.mark_processed_remote_sdp();
        if !self.is_state(CallStateName::Connecting) {
            return;
        }

        let signal = self.envelope(SignalType::Answer).with_session_description(answer);
        if let Err(e) = self.inner.channel.send_sdp(signal).await {
            return self.fail(e);
        }
        self.inner.negotiation.lock().sdp_sent = true;
        self.inner.state.mark_sent_sdp();
        self.flush_local_candidates().await;
    }

    async fn add_remote_candidates(&self, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            if let Err(e) = self.inner.peer.add_ice_candidate(candidate).await {
                warn!(session = %self.id(), error = %e, "failed to add remote candidate");
            }
        }
    }

    async fn flush_local_candidates(&self) {
        let candidates = self.inner.negotiation.lock().candidates.take_outbound();
        if candidates.is_empty() {
            return;
        }
        debug!(session = %self.id(), count = candidates.len(), "sending queued candidates");
        let signal = self.envelope(SignalType::Candidate).with_candidates(candidates);
        if let Err(e) = self.inner.channel.send_candidate(signal).await {
            self.fail(e);
        }
    }

    /// Log a failure, report it and end the session locally.
    fn fail(&self, error: SessionError) {
        warn!(session = %self.id(), %error, "session failure, hanging up");
        if error.is_signaling_failure() {
            self.inner.negotiation.lock().suppress_bye = true;
        }
        self.fire(SessionEvent::Error {
            message: error.to_string(),
        });
        self.hangup(Some(error.to_string()));
    }

    fn envelope(&self, signal_type: SignalType) -> SignalEnvelope {
        let params = &self.inner.params;
        SignalEnvelope::new(signal_type, params.kind.into(), params.id.clone())
            .with_sender(params.local_endpoint.clone(), params.local_connection.clone())
            .with_recipient(Some(params.remote_endpoint.clone()), self.remote_connection())
    }
}

/// Run `action` on a fresh task of the machine's runtime whenever `state` is entered.
fn on_entry<F, Fut>(inner: &Arc<SessionInner>, state: CallStateName, action: F)
where
    F: Fn(Session, StateEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let weak = Arc::downgrade(inner);
    inner.state.listen_internal(&state.entry_event(), move |event| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let task = action(Session { inner: Arc::clone(&inner) }, event.clone());
        inner.state.runtime().spawn(task);
    });
}
