//! Inbound signal routing and the live-session registry.

pub mod directory;
pub mod dispatch;

pub use directory::SessionDirectory;
pub use dispatch::{DropReason, RouteOutcome, SessionFactory, SignalRouter};
