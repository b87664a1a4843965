use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{SessionError, SessionResult};
use crate::state_table::TimerKind;

/// Negotiation timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTimeouts {
    pub answer_ms: u64,
    pub receive_answer_ms: u64,
    pub connection_ms: u64,
    pub modify_ms: u64,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            answer_ms: 10_000,
            receive_answer_ms: 60_000,
            connection_ms: 10_000,
            modify_ms: 60_000,
        }
    }
}

impl CallTimeouts {
    pub fn with_answer_ms(mut self, ms: u64) -> Self {
        self.answer_ms = ms;
        self
    }

    pub fn with_receive_answer_ms(mut self, ms: u64) -> Self {
        self.receive_answer_ms = ms;
        self
    }

    pub fn with_connection_ms(mut self, ms: u64) -> Self {
        self.connection_ms = ms;
        self
    }

    pub fn with_modify_ms(mut self, ms: u64) -> Self {
        self.modify_ms = ms;
        self
    }

    pub fn duration(&self, kind: TimerKind) -> Duration {
        let ms = match kind {
            TimerKind::Answer => self.answer_ms,
            TimerKind::ReceiveAnswer => self.receive_answer_ms,
            TimerKind::Connection => self.connection_ms,
            TimerKind::Modify => self.modify_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> SessionResult<()> {
        let fields = [
            ("answer_ms", self.answer_ms),
            ("receive_answer_ms", self.receive_answer_ms),
            ("connection_ms", self.connection_ms),
            ("modify_ms", self.modify_ms),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(SessionError::invalid_config(field, "timeout must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let timeouts = CallTimeouts::default();
        assert_eq!(timeouts.duration(TimerKind::Answer), Duration::from_secs(10));
        assert_eq!(timeouts.duration(TimerKind::ReceiveAnswer), Duration::from_secs(60));
        assert_eq!(timeouts.duration(TimerKind::Connection), Duration::from_secs(10));
        assert_eq!(timeouts.duration(TimerKind::Modify), Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = CallTimeouts::default().with_modify_ms(0).validate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration { ref field, .. } if field == "modify_ms"));
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let timeouts: CallTimeouts = serde_json::from_str(r#"{"receive_answer_ms": 20}"#).unwrap();
        assert_eq!(timeouts.receive_answer_ms, 20);
        assert_eq!(timeouts.answer_ms, 10_000);
    }
}
