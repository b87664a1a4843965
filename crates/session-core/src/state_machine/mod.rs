//! Runtime side of the call state table.

pub mod config;
pub mod machine;
mod timers;

pub use config::CallTimeouts;
pub use machine::{CallState, CallStateBuilder, HasMediaFn, StateEvent, StatePhase};
