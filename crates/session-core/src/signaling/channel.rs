use async_trait::async_trait;

use super::message::{SignalEnvelope, SignalType};
use crate::errors::SessionResult;

/// Outbound half of the signaling relay.
///
/// Each method resolves once the relay has accepted the signal. An error means
/// the other party can no longer be reached and the session hangs up locally.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn send_sdp(&self, signal: SignalEnvelope) -> SessionResult<()>;

    async fn send_candidate(&self, signal: SignalEnvelope) -> SessionResult<()>;

    async fn send_connected(&self, signal: SignalEnvelope) -> SessionResult<()>;

    async fn send_modify(&self, signal: SignalEnvelope) -> SessionResult<()>;

    async fn send_hangup(&self, signal: SignalEnvelope) -> SessionResult<()>;

    /// Route an envelope to the send method matching its type.
    async fn send(&self, signal: SignalEnvelope) -> SessionResult<()> {
        match signal.signal_type {
            SignalType::Offer | SignalType::Answer => self.send_sdp(signal).await,
            SignalType::Candidate => self.send_candidate(signal).await,
            SignalType::Connected => self.send_connected(signal).await,
            SignalType::Modify => self.send_modify(signal).await,
            SignalType::Bye => self.send_hangup(signal).await,
        }
    }
}
