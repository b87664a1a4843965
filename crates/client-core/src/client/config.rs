//! Client configuration
//!
//! Settings can be built in code with the `with_*` methods or loaded from TOML:
//!
//! ```toml
//! app_id = "support-desk"
//! max_sessions = 4
//!
//! [session]
//! force_turn = true
//!
//! [session.timeouts]
//! answer_ms = 15000
//! ```

use serde::{Deserialize, Serialize};

use peerlink_session_core::{CallTimeouts, MediaConstraints, SessionConfig};

use crate::error::{ClientError, ClientResult};

/// Configuration for the peerlink client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application id sent with the credentials when they carry none
    pub app_id: Option<String>,
    /// Maximum number of concurrent sessions, inbound and outbound
    pub max_sessions: usize,
    /// How long `connect` waits for the service to open and authenticate
    pub connect_timeout_ms: u64,
    /// Negotiation settings handed to every session
    pub session: SessionConfig,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            app_id: None,
            max_sessions: 16,
            connect_timeout_ms: 10_000,
            session: SessionConfig::default(),
        }
    }

    pub fn from_toml_str(input: &str) -> ClientResult<Self> {
        let config: ClientConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.session.timeouts = timeouts;
        self
    }

    pub fn with_force_turn(mut self, force_turn: bool) -> Self {
        self.session.force_turn = force_turn;
        self
    }

    pub fn with_disable_turn(mut self, disable_turn: bool) -> Self {
        self.session.disable_turn = disable_turn;
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.session.constraints = constraints;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.max_sessions == 0 {
            return Err(ClientError::invalid_configuration(
                "max_sessions",
                "must be greater than zero",
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::invalid_configuration(
                "connect_timeout_ms",
                "must be greater than zero",
            ));
        }
        self.session.validate()?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
