//! Session-core: state table-based coordination of WebRTC calls and direct connections
//!
//! ## Layers
//! ```text
//! router      inbound signal envelopes -> sessions (creates callee sessions on offer)
//! session     orchestrator: state entries -> peer connection / media / signaling
//! state_machine  CallState: applies transitions, timers, <state>:entry|exit events
//! state_table pure (state, flags, event) -> transition mapping
//! events      named EventEmitter shared by every layer
//! ```
//!
//! The signaling transport and the platform WebRTC stack are reached through the
//! [`SignalingChannel`], [`PeerConnection`], [`MediaDevices`] and [`RtcPlatform`]
//! traits.

pub mod errors;
pub mod events;
pub mod router;
pub mod session;
pub mod signaling;
pub mod state_machine;
pub mod state_table;
pub mod types;

pub use errors::{SessionError, SessionResult};
pub use events::{EventEmitter, ListenerId, ListenerProbe, StaticProbe};
pub use router::{DropReason, RouteOutcome, SessionDirectory, SessionFactory, SignalRouter};
pub use session::{
    AnswerOptions, IceConnectionState, LocalStream, MediaDevices, PeerConnection, RtcPlatform,
    Session, SessionConfig, SessionDeps, SessionEvent, SessionParams,
};
pub use signaling::{
    IceCandidate, ModifyAction, SdpType, SessionDescription, SignalEnvelope, SignalTarget,
    SignalType, SignalingChannel,
};
pub use state_machine::{CallState, CallStateBuilder, CallTimeouts, StateEvent, StatePhase};
pub use state_table::{CallEvent, CallFlags, CallStateName, EventKind, TimerKind};
pub use types::{ConnectionId, EndpointId, MediaConstraints, SessionId, SessionKind};
