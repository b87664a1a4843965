//! The signal envelope exchanged through the signaling relay.
//!
//! Envelopes are JSON objects with camelCase keys. `signalType`, `target` and
//! `sessionId` must round-trip unchanged through the router.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SessionError, SessionResult};
use crate::types::{ConnectionId, EndpointId, MediaConstraints, SessionId, SessionKind};

pub const SIGNAL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalType {
    Offer,
    Answer,
    Connected,
    #[serde(alias = "iceCandidates")]
    Candidate,
    Modify,
    Bye,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Offer => "offer",
            SignalType::Answer => "answer",
            SignalType::Connected => "connected",
            SignalType::Candidate => "candidate",
            SignalType::Modify => "modify",
            SignalType::Bye => "bye",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of session a signal is addressed to
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalTarget {
    #[default]
    Call,
    DirectConnection,
}

impl From<SessionKind> for SignalTarget {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Call => SignalTarget::Call,
            SessionKind::DirectConnection => SignalTarget::DirectConnection,
        }
    }
}

impl From<SignalTarget> for SessionKind {
    fn from(target: SignalTarget) -> Self {
        match target {
            SignalTarget::Call => SessionKind::Call,
            SignalTarget::DirectConnection => SessionKind::DirectConnection,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// Opaque SDP blob with its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Opaque ICE candidate relayed verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }

    /// Whether this is a TURN relay candidate
    pub fn is_relay(&self) -> bool {
        self.candidate.contains("typ relay")
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifyAction {
    Initiate,
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub signal_type: SignalType,
    /// Absent on the wire means a call. Kept as received so relayed signals are unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SignalTarget>,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_endpoint: Option<EndpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_connection: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_endpoint: Option<EndpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_connection: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_description: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ice_candidates: Vec<IceCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ModifyAction>,
    /// Connection that won the call, carried by `connected`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<MediaConstraints>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    SIGNAL_VERSION.to_string()
}

impl SignalEnvelope {
    pub fn new(signal_type: SignalType, target: SignalTarget, session_id: SessionId) -> Self {
        Self {
            signal_type,
            target: Some(target),
            session_id,
            from_endpoint: None,
            from_connection: None,
            to_endpoint: None,
            to_connection: None,
            session_description: None,
            ice_candidates: Vec::new(),
            reason: None,
            action: None,
            connection_id: None,
            constraints: None,
            version: default_version(),
        }
    }

    /// Kind of session the signal is for
    pub fn session_kind(&self) -> SessionKind {
        self.target.unwrap_or_default().into()
    }

    pub fn with_sender(mut self, endpoint: Option<EndpointId>, connection: Option<ConnectionId>) -> Self {
        self.from_endpoint = endpoint;
        self.from_connection = connection;
        self
    }

    pub fn with_recipient(mut self, endpoint: Option<EndpointId>, connection: Option<ConnectionId>) -> Self {
        self.to_endpoint = endpoint;
        self.to_connection = connection;
        self
    }

    pub fn with_session_description(mut self, description: SessionDescription) -> Self {
        self.session_description = Some(description);
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<IceCandidate>) -> Self {
        self.ice_candidates = candidates;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_action(mut self, action: ModifyAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_connection_id(mut self, connection: ConnectionId) -> Self {
        self.connection_id = Some(connection);
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Parse and validate an inbound JSON signal.
    pub fn parse(json: &str) -> SessionResult<Self> {
        let envelope: SignalEnvelope = serde_json::from_str(json)?;
        envelope.validate()?;
        Ok(envelope)
    }

    pub fn to_json(&self) -> SessionResult<String> {
        serde_json::to_string(self).map_err(|e| SessionError::malformed(e.to_string()))
    }

    /// Check the payload required by the signal type is present.
    pub fn validate(&self) -> SessionResult<()> {
        if self.session_id.as_str().is_empty() {
            return Err(SessionError::malformed("missing sessionId"));
        }
        match self.signal_type {
            SignalType::Offer | SignalType::Answer => {
                if self.session_description.is_none() {
                    return Err(SessionError::malformed(format!(
                        "{} without sessionDescription",
                        self.signal_type
                    )));
                }
            }
            SignalType::Candidate => {
                if self.ice_candidates.is_empty() {
                    return Err(SessionError::malformed("candidate signal without iceCandidates"));
                }
            }
            SignalType::Modify => {
                if self.action.is_none() {
                    return Err(SessionError::malformed("modify signal without action"));
                }
            }
            SignalType::Connected | SignalType::Bye => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_offer_with_default_target() {
        let json = r#"{
            "signalType": "offer",
            "sessionId": "abc",
            "fromEndpoint": "bob",
            "fromConnection": "bob-1",
            "sessionDescription": {"type": "offer", "sdp": "v=0"}
        }"#;
        let envelope = SignalEnvelope::parse(json).unwrap();
        assert_eq!(envelope.signal_type, SignalType::Offer);
        assert_eq!(envelope.target, None);
        assert_eq!(envelope.session_kind(), SessionKind::Call);
        assert_eq!(envelope.session_id, SessionId::from("abc"));
        assert_eq!(envelope.version, SIGNAL_VERSION);
        assert_eq!(envelope.session_description, Some(SessionDescription::offer("v=0")));
    }

    #[test]
    fn accepts_legacy_candidate_name() {
        let json = r#"{
            "signalType": "iceCandidates",
            "target": "directConnection",
            "sessionId": "abc",
            "iceCandidates": [{"candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host", "sdpMid": "0", "sdpMLineIndex": 0}]
        }"#;
        let envelope = SignalEnvelope::parse(json).unwrap();
        assert_eq!(envelope.signal_type, SignalType::Candidate);
        assert_eq!(envelope.target, Some(SignalTarget::DirectConnection));
        assert_eq!(envelope.session_kind(), SessionKind::DirectConnection);
        assert_eq!(envelope.ice_candidates[0].sdp_m_line_index, Some(0));
    }

    #[test]
    fn rejects_unknown_signal_type() {
        let json = r#"{"signalType": "ring", "sessionId": "abc"}"#;
        assert!(matches!(
            SignalEnvelope::parse(json),
            Err(SessionError::MalformedSignal(_))
        ));
    }

    #[test]
    fn rejects_answer_without_sdp() {
        let json = r#"{"signalType": "answer", "sessionId": "abc"}"#;
        assert!(SignalEnvelope::parse(json).is_err());
    }

    #[test]
    fn routing_fields_survive_serialization() {
        let envelope = SignalEnvelope::new(
            SignalType::Modify,
            SignalTarget::DirectConnection,
            SessionId::from("s-1"),
        )
        .with_action(ModifyAction::Initiate);

        let json = envelope.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["signalType"], "modify");
        assert_eq!(value["target"], "directConnection");
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["action"], "initiate");
        assert_eq!(SignalEnvelope::parse(&json).unwrap(), envelope);
    }

    #[test]
    fn missing_target_is_not_added_when_relayed() {
        let json = r#"{"signalType": "bye", "sessionId": "abc", "reason": "done"}"#;
        let envelope = SignalEnvelope::parse(json).unwrap();

        let relayed: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert!(relayed.get("target").is_none());
        assert_eq!(relayed["reason"], "done");
    }

    #[test]
    fn relay_candidates_are_detected() {
        assert!(IceCandidate::new("candidate:2 1 udp 5 1.2.3.4 3478 typ relay raddr 0.0.0.0").is_relay());
        assert!(!IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 5000 typ host").is_relay());
    }
}
