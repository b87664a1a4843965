use serde::{Deserialize, Serialize};

use crate::errors::{SessionError, SessionResult};
use crate::state_machine::CallTimeouts;
use crate::types::MediaConstraints;

/// Per-session negotiation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeouts: CallTimeouts,
    /// Signal only TURN relay candidates
    pub force_turn: bool,
    /// Never signal TURN relay candidates
    pub disable_turn: bool,
    /// Media requested when the application does not say otherwise
    pub constraints: MediaConstraints,
    pub data_channel_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeouts: CallTimeouts::default(),
            force_turn: false,
            disable_turn: false,
            constraints: MediaConstraints::default(),
            data_channel_label: "peerlink".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_force_turn(mut self, force_turn: bool) -> Self {
        self.force_turn = force_turn;
        self
    }

    pub fn with_disable_turn(mut self, disable_turn: bool) -> Self {
        self.disable_turn = disable_turn;
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_data_channel_label(mut self, label: impl Into<String>) -> Self {
        self.data_channel_label = label.into();
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        self.timeouts.validate()?;
        if self.force_turn && self.disable_turn {
            return Err(SessionError::invalid_config(
                "force_turn",
                "force_turn and disable_turn cannot both be set",
            ));
        }
        if self.data_channel_label.is_empty() {
            return Err(SessionError::invalid_config("data_channel_label", "must not be empty"));
        }
        Ok(())
    }
}
