//! In-memory signaling service and WebRTC platform for client tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peerlink_client_core::{
    Client, ClientBuilder, ClientChannel, ClientConfig, ClientError, ClientEvent, ClientResult,
    Credentials, GroupId, GroupMember, Identity, Message, Presence,
};
use peerlink_session_core::{
    ConnectionId, IceCandidate, LocalStream, MediaConstraints, MediaDevices, PeerConnection,
    RtcPlatform, SessionDescription, SessionKind, SessionResult, SignalEnvelope, SignalType,
    SignalingChannel,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("peerlink_client_core=debug,peerlink_session_core=debug")
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MockService {
    pub signals: Mutex<Vec<SignalEnvelope>>,
    pub messages: Mutex<Vec<Message>>,
    pub presences: Mutex<Vec<Presence>>,
    pub joined: Mutex<Vec<GroupId>>,
    pub left: Mutex<Vec<GroupId>>,
    pub members: Mutex<HashMap<GroupId, Vec<GroupMember>>>,
    pub opened_with: Mutex<Option<Credentials>>,
    pub closed: AtomicBool,
    pub reject_auth: AtomicBool,
    pub stall_open: AtomicBool,
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent_of(&self, signal_type: SignalType) -> Vec<SignalEnvelope> {
        self.signals
            .lock()
            .iter()
            .filter(|s| s.signal_type == signal_type)
            .cloned()
            .collect()
    }

    fn record(&self, signal: SignalEnvelope) -> SessionResult<()> {
        self.signals.lock().push(signal);
        Ok(())
    }
}

#[async_trait]
impl SignalingChannel for MockService {
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

#[async_trait]
impl ClientChannel for MockService {
    async fn open(&self, credentials: &Credentials) -> ClientResult<()> {
        if self.stall_open.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        *self.opened_with.lock() = Some(credentials.clone());
        Ok(())
    }

    async fn authenticate(&self, credentials: &Credentials) -> ClientResult<Identity> {
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(ClientError::authentication_failed("bad token"));
        }
        let endpoint_id = credentials
            .endpoint_id
            .clone()
            .unwrap_or_else(|| "anonymous".into());
        let connection_id = ConnectionId::from(format!("{endpoint_id}-1"));
        Ok(Identity {
            endpoint_id,
            connection_id,
        })
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn join_group(&self, group: &GroupId) -> ClientResult<()> {
        self.joined.lock().push(group.clone());
        Ok(())
    }

    async fn leave_group(&self, group: &GroupId) -> ClientResult<()> {
        self.left.lock().push(group.clone());
        Ok(())
    }

    async fn get_group_members(&self, group: &GroupId) -> ClientResult<Vec<GroupMember>> {
        Ok(self.members.lock().get(group).cloned().unwrap_or_default())
    }

    async fn send_message(&self, message: &Message) -> ClientResult<()> {
        self.messages.lock().push(message.clone());
        Ok(())
    }

    async fn send_presence(&self, presence: &Presence) -> ClientResult<()> {
        self.presences.lock().push(presence.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct StubPeer {
    pub closed: AtomicBool,
}

#[async_trait]
impl PeerConnection for StubPeer {
    async fn create_offer(&self) -> SessionResult<SessionDescription> {
        Ok(SessionDescription::offer("v=0 local offer"))
    }

    async fn create_answer(&self) -> SessionResult<SessionDescription> {
        Ok(SessionDescription::answer("v=0 local answer"))
    }

    async fn set_local_description(&self, _description: SessionDescription) -> SessionResult<()> {
        Ok(())
    }

    async fn set_remote_description(&self, _description: SessionDescription) -> SessionResult<()> {
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> SessionResult<()> {
        Ok(())
    }

    async fn add_local_stream(&self, _stream: &LocalStream) -> SessionResult<()> {
        Ok(())
    }

    async fn open_data_channel(&self, _label: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn send_data(&self, _data: &str) -> SessionResult<()> {
        Ok(())
    }

    fn has_media(&self) -> bool {
        false
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct StubMedia;

#[async_trait]
impl MediaDevices for StubMedia {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> SessionResult<LocalStream> {
        Ok(LocalStream {
            id: "camera".into(),
            audio: constraints.audio,
            video: constraints.video,
        })
    }

    async fn stop(&self, _stream: &LocalStream) {}
}

#[derive(Default)]
pub struct StubPlatform {
    pub peers: Mutex<Vec<Arc<StubPeer>>>,
}

impl RtcPlatform for StubPlatform {
    fn create_peer_connection(&self, _kind: SessionKind) -> SessionResult<Arc<dyn PeerConnection>> {
        let peer = Arc::new(StubPeer::default());
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }

    fn media_devices(&self) -> Option<Arc<dyn MediaDevices>> {
        Some(Arc::new(StubMedia))
    }
}

pub struct Fixture {
    pub service: Arc<MockService>,
    pub platform: Arc<StubPlatform>,
    pub client: Arc<Client>,
}

pub fn fixture() -> Fixture {
    fixture_with(ClientConfig::default())
}

pub fn fixture_with(config: ClientConfig) -> Fixture {
    let service = MockService::new();
    let platform = Arc::new(StubPlatform::default());
    let client = ClientBuilder::new()
        .config(config)
        .channel(service.clone())
        .platform(platform.clone())
        .build()
        .expect("client builds");
    Fixture {
        service,
        platform,
        client,
    }
}

pub async fn connected() -> Fixture {
    let fixture = fixture();
    fixture
        .client
        .connect(Credentials::new("bob"))
        .await
        .expect("connects");
    fixture
}

/// Collect every client event fired under `name`
pub fn capture(client: &Client, name: &str) -> Arc<Mutex<Vec<ClientEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    client.listen(name, move |event| sink.lock().push(event.clone()));
    seen
}

/// An offer from alice's first connection to bob's
pub fn inbound_offer(session_id: &str, kind: SessionKind) -> SignalEnvelope {
    SignalEnvelope::new(SignalType::Offer, kind.into(), session_id.into())
        .with_sender(Some("alice".into()), Some("alice-1".into()))
        .with_recipient(Some("bob".into()), Some("bob-1".into()))
        .with_session_description(SessionDescription::offer("v=0 remote offer"))
}

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
