//! Event emission shared by the state machine, sessions and the client.

pub mod emitter;

pub use emitter::{EventEmitter, ListenerId, ListenerProbe, StaticProbe};
