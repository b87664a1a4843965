//! Signal envelope and the outbound signaling channel.

pub mod channel;
pub mod message;

pub use channel::SignalingChannel;
pub use message::{
    IceCandidate, ModifyAction, SdpType, SessionDescription, SignalEnvelope, SignalTarget,
    SignalType, SIGNAL_VERSION,
};
