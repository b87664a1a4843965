//! State table for call and direct-connection sessions.
//!
//! The table is a pure mapping from (state, flags, event) to a [`Transition`].
//! Applying transitions, running entry/exit actions and owning timers is the job
//! of [`crate::state_machine`].

pub mod table;
pub mod types;

pub use table::{resolve, TableContext, NO_LISTENER_REASON};
pub use types::{CallEvent, CallFlags, CallStateName, Effect, EventKind, TimerKind, Transition};
