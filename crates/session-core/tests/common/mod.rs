//! Shared test doubles for session-core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peerlink_session_core::{
    AnswerOptions, CallEvent, CallState, CallStateName, CallTimeouts, IceCandidate, ListenerProbe,
    LocalStream, MediaConstraints, MediaDevices, PeerConnection, RtcPlatform, Session,
    SessionConfig, SessionDeps, SessionDescription, SessionDirectory, SessionError, SessionKind,
    SessionParams, SessionResult, SignalEnvelope, SignalType, SignalingChannel, StaticProbe,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("peerlink_session_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn probe(has_listeners: bool) -> Arc<dyn ListenerProbe> {
    Arc::new(StaticProbe(has_listeners))
}

// ---------------------------------------------------------------------------
// State machine helpers
// ---------------------------------------------------------------------------

pub fn machine(caller: bool) -> CallState {
    machine_with(caller, CallTimeouts::default())
}

pub fn machine_with(caller: bool, timeouts: CallTimeouts) -> CallState {
    CallState::builder()
        .caller(caller)
        .kind(SessionKind::Call)
        .timeouts(timeouts)
        .has_media(|| false)
        .build()
        .expect("valid machine")
}

/// Record the name of every entry/exit event fired by `machine`.
pub fn record(machine: &CallState) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for state in CallStateName::ALL {
        for name in [state.entry_event(), state.exit_event()] {
            let log = log.clone();
            machine.listen(&name, move |event| log.lock().push(event.name()));
        }
    }
    log
}

pub fn count(log: &Arc<Mutex<Vec<String>>>, name: &str) -> usize {
    log.lock().iter().filter(|entry| entry.as_str() == name).count()
}

/// Drive a caller-side machine along the happy path until it sits in `target`.
pub fn drive_to(machine: &CallState, target: CallStateName) {
    if target == CallStateName::Terminated {
        machine.dispatch(CallEvent::hangup("test"));
        return;
    }
    let path = [
        CallEvent::Initiate { listeners: probe(true) },
        CallEvent::Answer { preview_local_media: false },
        CallEvent::Approve,
        CallEvent::ReceiveLocalMedia,
        CallEvent::SentOffer,
        CallEvent::ReceiveAnswer,
        CallEvent::ReceiveRemoteMedia,
        CallEvent::Modify { receive: false },
    ];
    for event in path {
        if machine.current_state() == target {
            return;
        }
        machine.dispatch(event);
    }
    assert_eq!(machine.current_state(), target, "could not drive machine to {target}");
}

pub fn sample_event(kind: peerlink_session_core::EventKind) -> CallEvent {
    use peerlink_session_core::EventKind as K;
    match kind {
        K::Initiate => CallEvent::Initiate { listeners: probe(true) },
        K::Answer => CallEvent::Answer { preview_local_media: false },
        K::Approve => CallEvent::Approve,
        K::ReceiveLocalMedia => CallEvent::ReceiveLocalMedia,
        K::SentOffer => CallEvent::SentOffer,
        K::ReceiveAnswer => CallEvent::ReceiveAnswer,
        K::ReceiveRemoteMedia => CallEvent::ReceiveRemoteMedia,
        K::Modify => CallEvent::Modify { receive: true },
        K::Accept => CallEvent::Accept,
        K::Reject => CallEvent::Reject { reason: None },
        K::Hangup => CallEvent::Hangup { reason: None, received_bye: false },
    }
}

// ---------------------------------------------------------------------------
// Signaling double
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<SignalEnvelope>>,
    failing: Mutex<HashSet<SignalType>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every send of `signal_type` fail.
    pub fn fail_on(&self, signal_type: SignalType) {
        self.failing.lock().insert(signal_type);
    }

    pub fn sent(&self) -> Vec<SignalEnvelope> {
        self.sent.lock().clone()
    }

    pub fn sent_of(&self, signal_type: SignalType) -> Vec<SignalEnvelope> {
        self.sent
            .lock()
            .iter()
            .filter(|signal| signal.signal_type == signal_type)
            .cloned()
            .collect()
    }

    fn record(&self, signal: SignalEnvelope) -> SessionResult<()> {
        if self.failing.lock().contains(&signal.signal_type) {
            return Err(SessionError::signaling(format!(
                "relay refused {}",
                signal.signal_type
            )));
        }
        self.sent.lock().push(signal);
        Ok(())
    }
}

#[async_trait]
impl SignalingChannel for MockChannel {
    async fn send_sdp(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.record(signal)
    }

    async fn send_candidate(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.record(signal)
    }

    async fn send_connected(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.record(signal)
    }

    async fn send_modify(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.record(signal)
    }

    async fn send_hangup(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.record(signal)
    }
}

// ---------------------------------------------------------------------------
// Platform doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPeer {
    pub media_flowing: AtomicBool,
    pub fail_create_offer: AtomicBool,
    pub closed: AtomicBool,
    pub data_channel_opened: AtomicBool,
    pub local: Mutex<Vec<SessionDescription>>,
    pub remote: Mutex<Vec<SessionDescription>>,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub streams: Mutex<Vec<LocalStream>>,
    pub sent_data: Mutex<Vec<String>>,
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn create_offer(&self) -> SessionResult<SessionDescription> {
        if self.fail_create_offer.load(Ordering::SeqCst) {
            return Err(SessionError::PeerConnection("offer failed".into()));
        }
        Ok(SessionDescription::offer("v=0 offer"))
    }

    async fn create_answer(&self) -> SessionResult<SessionDescription> {
        Ok(SessionDescription::answer("v=0 answer"))
    }

    async fn set_local_description(&self, description: SessionDescription) -> SessionResult<()> {
        self.local.lock().push(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> SessionResult<()> {
        self.remote.lock().push(description);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()> {
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn add_local_stream(&self, stream: &LocalStream) -> SessionResult<()> {
        self.streams.lock().push(stream.clone());
        Ok(())
    }

    async fn open_data_channel(&self, _label: &str) -> SessionResult<()> {
        self.data_channel_opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_data(&self, data: &str) -> SessionResult<()> {
        self.sent_data.lock().push(data.to_string());
        Ok(())
    }

    fn has_media(&self) -> bool {
        self.media_flowing.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockMedia {
    pub deny: AtomicBool,
    pub granted: AtomicUsize,
    pub stopped: Mutex<Vec<LocalStream>>,
}

#[async_trait]
impl MediaDevices for MockMedia {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> SessionResult<LocalStream> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(SessionError::MediaError("permission denied".into()));
        }
        let n = self.granted.fetch_add(1, Ordering::SeqCst);
        Ok(LocalStream {
            id: format!("stream-{n}"),
            audio: constraints.audio,
            video: constraints.video,
        })
    }

    async fn stop(&self, stream: &LocalStream) {
        self.stopped.lock().push(stream.clone());
    }
}

#[derive(Default)]
pub struct MockPlatform {
    pub media: Arc<MockMedia>,
    pub peers: Mutex<Vec<Arc<MockPeer>>>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_peer(&self) -> Arc<MockPeer> {
        self.peers.lock().last().cloned().expect("a peer was created")
    }
}

impl RtcPlatform for MockPlatform {
    fn create_peer_connection(&self, _kind: SessionKind) -> SessionResult<Arc<dyn PeerConnection>> {
        let peer = Arc::new(MockPeer::default());
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }

    fn media_devices(&self) -> Option<Arc<dyn MediaDevices>> {
        Some(self.media.clone())
    }
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

pub struct Harness {
    pub channel: Arc<MockChannel>,
    pub platform: Arc<MockPlatform>,
    pub directory: Arc<SessionDirectory>,
    pub config: SessionConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            channel: MockChannel::new(),
            platform: MockPlatform::new(),
            directory: Arc::new(SessionDirectory::new()),
            config: SessionConfig::default(),
        }
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            channel: self.channel.clone(),
            platform: self.platform.clone(),
            directory: Arc::downgrade(&self.directory),
            config: self.config.clone(),
        }
    }

    pub fn caller(&self, kind: SessionKind) -> Session {
        let params = SessionParams::outgoing(kind, "bob".into())
            .with_local(Some("alice".into()), Some("alice-1".into()));
        let session = Session::new(params, self.deps()).expect("session");
        self.directory.insert(session.clone()).expect("unique id");
        session
    }

    pub fn callee(&self, offer: &SignalEnvelope) -> Session {
        let params = SessionParams::incoming(offer).expect("valid offer");
        let session = Session::new(params, self.deps()).expect("session");
        self.directory.insert(session.clone()).expect("unique id");
        session
    }
}

pub fn offer_for(session_id: &str, kind: SessionKind) -> SignalEnvelope {
    SignalEnvelope::new(SignalType::Offer, kind.into(), session_id.into())
        .with_sender(Some("alice".into()), Some("alice-1".into()))
        .with_recipient(Some("bob".into()), Some("bob-1".into()))
        .with_session_description(SessionDescription::offer("v=0 remote offer"))
}

pub fn reply_for(session: &Session, signal_type: SignalType) -> SignalEnvelope {
    SignalEnvelope::new(signal_type, session.kind().into(), session.id().clone())
        .with_sender(Some("bob".into()), Some("bob-1".into()))
        .with_recipient(Some("alice".into()), Some("alice-1".into()))
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_state(session: &Session, state: CallStateName) {
    eventually(&format!("state {state}"), || session.current_state() == state).await;
}

pub fn no_preview() -> AnswerOptions {
    AnswerOptions::default()
}
