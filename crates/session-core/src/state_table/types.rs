use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::events::ListenerProbe;

/// States of a call or direct connection
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallStateName {
    Idle,
    Preparing,
    ApprovingDeviceAccess,
    ApprovingContent,
    Offering,
    Connecting,
    Connected,
    Modifying,
    Terminated,
}

impl CallStateName {
    pub const ALL: [CallStateName; 9] = [
        CallStateName::Idle,
        CallStateName::Preparing,
        CallStateName::ApprovingDeviceAccess,
        CallStateName::ApprovingContent,
        CallStateName::Offering,
        CallStateName::Connecting,
        CallStateName::Connected,
        CallStateName::Modifying,
        CallStateName::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStateName::Idle => "idle",
            CallStateName::Preparing => "preparing",
            CallStateName::ApprovingDeviceAccess => "approvingDeviceAccess",
            CallStateName::ApprovingContent => "approvingContent",
            CallStateName::Offering => "offering",
            CallStateName::Connecting => "connecting",
            CallStateName::Connected => "connected",
            CallStateName::Modifying => "modifying",
            CallStateName::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStateName::Terminated)
    }

    /// States in which a renegotiation may still be underway
    pub fn is_negotiating(&self) -> bool {
        matches!(
            self,
            CallStateName::Preparing
                | CallStateName::ApprovingDeviceAccess
                | CallStateName::ApprovingContent
                | CallStateName::Offering
                | CallStateName::Modifying
        )
    }

    /// Name of the event fired when this state is entered
    pub fn entry_event(&self) -> String {
        format!("{}:entry", self.as_str())
    }

    /// Name of the event fired when this state is left
    pub fn exit_event(&self) -> String {
        format!("{}:exit", self.as_str())
    }
}

impl fmt::Display for CallStateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events accepted by the state machine, one variant per dispatch name
#[derive(Clone)]
pub enum CallEvent {
    Initiate { listeners: Arc<dyn ListenerProbe> },
    Answer { preview_local_media: bool },
    Approve,
    ReceiveLocalMedia,
    SentOffer,
    ReceiveAnswer,
    ReceiveRemoteMedia,
    /// `receive` marks this side as the non-initiator of the renegotiation
    Modify { receive: bool },
    Accept,
    Reject { reason: Option<String> },
    /// `received_bye` is set when the hangup was signaled by the remote party
    Hangup { reason: Option<String>, received_bye: bool },
}

impl CallEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CallEvent::Initiate { .. } => EventKind::Initiate,
            CallEvent::Answer { .. } => EventKind::Answer,
            CallEvent::Approve => EventKind::Approve,
            CallEvent::ReceiveLocalMedia => EventKind::ReceiveLocalMedia,
            CallEvent::SentOffer => EventKind::SentOffer,
            CallEvent::ReceiveAnswer => EventKind::ReceiveAnswer,
            CallEvent::ReceiveRemoteMedia => EventKind::ReceiveRemoteMedia,
            CallEvent::Modify { .. } => EventKind::Modify,
            CallEvent::Accept => EventKind::Accept,
            CallEvent::Reject { .. } => EventKind::Reject,
            CallEvent::Hangup { .. } => EventKind::Hangup,
        }
    }

    pub fn hangup(reason: impl Into<String>) -> Self {
        CallEvent::Hangup {
            reason: Some(reason.into()),
            received_bye: false,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        CallEvent::Reject {
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Debug for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallEvent::Initiate { .. } => f.debug_struct("Initiate").finish_non_exhaustive(),
            CallEvent::Answer { preview_local_media } => f
                .debug_struct("Answer")
                .field("preview_local_media", preview_local_media)
                .finish(),
            CallEvent::Modify { receive } => {
                f.debug_struct("Modify").field("receive", receive).finish()
            }
            CallEvent::Reject { reason } => f.debug_struct("Reject").field("reason", reason).finish(),
            CallEvent::Hangup {
                reason,
                received_bye,
            } => f
                .debug_struct("Hangup")
                .field("reason", reason)
                .field("received_bye", received_bye)
                .finish(),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Payload-free discriminant of [`CallEvent`]
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Initiate,
    Answer,
    Approve,
    ReceiveLocalMedia,
    SentOffer,
    ReceiveAnswer,
    ReceiveRemoteMedia,
    Modify,
    Accept,
    Reject,
    Hangup,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Initiate,
        EventKind::Answer,
        EventKind::Approve,
        EventKind::ReceiveLocalMedia,
        EventKind::SentOffer,
        EventKind::ReceiveAnswer,
        EventKind::ReceiveRemoteMedia,
        EventKind::Modify,
        EventKind::Accept,
        EventKind::Reject,
        EventKind::Hangup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Initiate => "initiate",
            EventKind::Answer => "answer",
            EventKind::Approve => "approve",
            EventKind::ReceiveLocalMedia => "receiveLocalMedia",
            EventKind::SentOffer => "sentOffer",
            EventKind::ReceiveAnswer => "receiveAnswer",
            EventKind::ReceiveRemoteMedia => "receiveRemoteMedia",
            EventKind::Modify => "modify",
            EventKind::Accept => "accept",
            EventKind::Reject => "reject",
            EventKind::Hangup => "hangup",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four negotiation timeouts
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    /// Armed on `preparing`: the session must be answered in time
    Answer,
    /// Armed once the offer is sent: the answer must arrive in time
    ReceiveAnswer,
    /// Armed on `connecting`: transport must come up in time
    Connection,
    /// Armed on `modifying`: the renegotiation must be accepted or rejected in time
    Modify,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::Answer,
        TimerKind::ReceiveAnswer,
        TimerKind::Connection,
        TimerKind::Modify,
    ];

    /// Hangup reason recorded when this timer expires
    pub fn hangup_reason(&self) -> &'static str {
        match self {
            TimerKind::Answer => "answer own call timer",
            TimerKind::ReceiveAnswer => "receive answer timer",
            TimerKind::Connection => "connection timer",
            TimerKind::Modify => "modify timer",
        }
    }
}

/// Flags mutated by transition actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFlags {
    /// Effective role; recomputed when a renegotiation is accepted
    pub caller: bool,
    pub has_local_media_approval: bool,
    pub has_local_media: bool,
    pub received_bye: bool,
    pub sent_sdp: bool,
    pub processed_remote_sdp: bool,
    pub hangup_reason: Option<String>,
}

impl CallFlags {
    pub fn new(caller: bool) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    /// Clear everything a fresh offer/answer round renegotiates.
    pub(crate) fn reset_negotiation(&mut self) {
        self.has_local_media_approval = false;
        self.has_local_media = false;
        self.sent_sdp = false;
        self.processed_remote_sdp = false;
    }
}

/// Flag update carried by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetLocalMediaApproval,
    SetLocalMedia,
    SetSentSdp,
    SetProcessedRemoteSdp,
    SetReceivedBye,
    /// Record why the session ended; the first recorded reason is kept
    RecordHangupReason(String),
    ArmTimer(TimerKind),
    /// Remember whether this side received the renegotiation request
    MarkModifyReceived(bool),
    SetCaller(bool),
    /// Return to the role the session had when it was last connected
    RestoreRole,
}

/// Result of resolving an event against the current state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// State to enter; `None` keeps the current state without exit/entry
    pub next: Option<CallStateName>,
    pub effects: Vec<Effect>,
    /// Continue straight to `terminated` after entering `next`, with this reason
    pub auto_reject: Option<String>,
}

impl Transition {
    pub fn to(next: CallStateName) -> Self {
        Self {
            next: Some(next),
            ..Default::default()
        }
    }

    pub fn internal() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_auto_reject(mut self, reason: impl Into<String>) -> Self {
        self.auto_reject = Some(reason.into());
        self
    }
}
