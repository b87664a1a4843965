//! Call and direct-connection orchestration.

pub mod candidates;
pub mod config;
pub mod events;
pub mod peer;
pub mod session;

pub use candidates::{CandidateQueues, RelayPolicy};
pub use config::SessionConfig;
pub use events::SessionEvent;
pub use peer::{IceConnectionState, LocalStream, MediaDevices, PeerConnection, RtcPlatform};
pub use session::{AnswerOptions, Session, SessionDeps, SessionParams};
