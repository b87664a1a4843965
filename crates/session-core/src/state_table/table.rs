//! The transition table.
//!
//! `resolve` is a pure function of the current state, the flags, a small
//! context and the event. It returns `None` for every (state, event) pair that
//! is not a valid transition; the machine treats those as no-ops.

use super::types::{CallEvent, CallFlags, CallStateName, Effect, TimerKind, Transition};
use crate::types::SessionKind;

/// Hangup reason used when a callee has nobody to hand the inbound session to
pub const NO_LISTENER_REASON: &str = "no call listener";

/// Machine-owned facts the table needs beyond [`CallFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableContext {
    pub kind: SessionKind,
    /// Result of the owner's `has_media` predicate, sampled before dispatch
    pub has_media: bool,
    /// This side received the pending renegotiation request
    pub modify_received: bool,
}

pub fn resolve(
    state: CallStateName,
    flags: &CallFlags,
    ctx: &TableContext,
    event: &CallEvent,
) -> Option<Transition> {
    use CallStateName as S;

    if state.is_terminal() {
        return None;
    }

    // Hangup is valid from every live state.
    if let CallEvent::Hangup {
        reason,
        received_bye,
    } = event
    {
        let mut transition = Transition::to(S::Terminated);
        if *received_bye {
            transition = transition.with_effect(Effect::SetReceivedBye);
        }
        return Some(transition.with_effect(Effect::RecordHangupReason(
            reason.clone().unwrap_or_else(|| "none".to_string()),
        )));
    }

    match (state, event) {
        (S::Idle, CallEvent::Initiate { listeners }) => {
            let transition = Transition::to(S::Preparing);
            if !flags.caller && !listeners.has_listeners(ctx.kind.incoming_event_name()) {
                Some(transition.with_auto_reject(NO_LISTENER_REASON))
            } else {
                Some(transition)
            }
        }

        (S::Preparing, CallEvent::Answer { preview_local_media }) => {
            if ctx.kind.is_direct_connection() && !preview_local_media {
                Some(Transition::to(negotiation_target(flags)).with_effect(Effect::SetLocalMediaApproval))
            } else {
                Some(Transition::to(S::ApprovingDeviceAccess))
            }
        }

        (S::ApprovingDeviceAccess, CallEvent::Approve) => {
            Some(Transition::to(S::ApprovingContent).with_effect(Effect::SetLocalMediaApproval))
        }

        (S::ApprovingContent, CallEvent::Approve) => {
            if flags.has_local_media {
                Some(Transition::to(negotiation_target(flags)).with_effect(Effect::SetLocalMediaApproval))
            } else {
                Some(Transition::internal().with_effect(Effect::SetLocalMediaApproval))
            }
        }

        (S::ApprovingContent, CallEvent::ReceiveLocalMedia) => {
            if flags.has_local_media_approval {
                Some(Transition::to(negotiation_target(flags)).with_effect(Effect::SetLocalMedia))
            } else {
                Some(Transition::internal().with_effect(Effect::SetLocalMedia))
            }
        }

        (S::Offering, CallEvent::ReceiveLocalMedia) => {
            Some(Transition::internal().with_effect(Effect::SetLocalMedia))
        }

        (S::Offering, CallEvent::SentOffer) => Some(
            Transition::internal()
                .with_effect(Effect::SetSentSdp)
                .with_effect(Effect::ArmTimer(TimerKind::ReceiveAnswer)),
        ),

        (S::Offering, CallEvent::ReceiveAnswer) => {
            Some(Transition::to(S::Connecting).with_effect(Effect::SetProcessedRemoteSdp))
        }

        (S::Connecting, CallEvent::ReceiveRemoteMedia) => Some(Transition::to(S::Connected)),

        (S::Connected, CallEvent::Modify { receive }) => {
            Some(Transition::to(S::Modifying).with_effect(Effect::MarkModifyReceived(*receive)))
        }

        (S::Modifying, CallEvent::Accept) => {
            Some(Transition::to(S::Preparing).with_effect(Effect::SetCaller(!ctx.modify_received)))
        }

        (S::Modifying, CallEvent::Reject { .. }) => {
            Some(Transition::to(S::Connected).with_effect(Effect::RestoreRole))
        }

        (
            S::Preparing
            | S::ApprovingDeviceAccess
            | S::ApprovingContent
            | S::Offering
            | S::Connecting,
            CallEvent::Reject { reason },
        ) => {
            if ctx.has_media {
                // A renegotiation was refused while media keeps flowing.
                Some(Transition::to(S::Connected).with_effect(Effect::RestoreRole))
            } else {
                Some(Transition::to(S::Terminated).with_effect(Effect::RecordHangupReason(
                    reason.clone().unwrap_or_else(|| "rejected".to_string()),
                )))
            }
        }

        _ => None,
    }
}

/// Where a fully approved side goes next: the caller offers, the callee waits for the offer.
fn negotiation_target(flags: &CallFlags) -> CallStateName {
    if flags.caller {
        CallStateName::Offering
    } else {
        CallStateName::Connecting
    }
}
