//! The `CallState` machine: applies table transitions, runs entry/exit
//! actions, owns the negotiation timers and publishes `<state>:entry` /
//! `<state>:exit` events.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use super::config::CallTimeouts;
use super::timers::TimerSet;
use crate::errors::{SessionError, SessionResult};
use crate::events::{EventEmitter, ListenerId};
use crate::state_table::{
    resolve, CallEvent, CallFlags, CallStateName, Effect, TableContext, TimerKind,
};
use crate::types::SessionKind;

/// Predicate telling the machine whether media currently flows
pub type HasMediaFn = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePhase {
    Entry,
    Exit,
}

impl StatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatePhase::Entry => "entry",
            StatePhase::Exit => "exit",
        }
    }
}

/// Payload of every `<state>:entry` and `<state>:exit` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    pub state: CallStateName,
    pub phase: StatePhase,
    /// For entry events, the state that was left
    pub previous: Option<CallStateName>,
    /// Effective role at the time of the event
    pub caller: bool,
    pub hangup_reason: Option<String>,
}

impl StateEvent {
    pub fn name(&self) -> String {
        format!("{}:{}", self.state.as_str(), self.phase.as_str())
    }
}

struct Core {
    state: CallStateName,
    flags: CallFlags,
    modify_received: bool,
    /// Role held when `connected` was last entered
    connected_caller: bool,
    timers: TimerSet,
    /// State events waiting for delivery, in transition order
    pending: VecDeque<StateEvent>,
    /// Set while some caller is delivering `pending`
    draining: bool,
}

impl Core {
    /// Take the drainer role if there is something to deliver and nobody else is.
    fn claim_drain(&mut self) -> bool {
        if self.draining || self.pending.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }
}

struct Inner {
    label: String,
    kind: SessionKind,
    timeouts: CallTimeouts,
    has_media: HasMediaFn,
    runtime: Handle,
    core: Mutex<Core>,
    emitter: EventEmitter<StateEvent>,
}

/// Hierarchical state machine bound 1:1 to a session.
///
/// Cloning yields another handle to the same machine. Each dispatch runs to
/// completion under the machine lock and queues its state events there. The
/// queue is delivered outside the lock by one caller at a time, so listeners
/// see every session's events in transition order even when dispatches race on
/// different threads. A listener that dispatches again only adds to the queue.
///
/// The machine must be built inside a tokio runtime. Timers run on that runtime
/// no matter which thread later dispatches.
#[derive(Clone)]
pub struct CallState {
    inner: Arc<Inner>,
}

impl fmt::Debug for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("CallState")
            .field("label", &self.inner.label)
            .field("kind", &self.inner.kind)
            .field("state", &core.state)
            .field("flags", &core.flags)
            .finish()
    }
}

#[derive(Default)]
pub struct CallStateBuilder {
    caller: Option<bool>,
    kind: Option<SessionKind>,
    has_media: Option<HasMediaFn>,
    timeouts: CallTimeouts,
    label: Option<String>,
}

impl CallStateBuilder {
    pub fn caller(mut self, caller: bool) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn kind(mut self, kind: SessionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn has_media<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.has_media = Some(Arc::new(predicate));
        self
    }

    pub fn has_media_fn(mut self, predicate: HasMediaFn) -> Self {
        self.has_media = Some(predicate);
        self
    }

    pub fn timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Identifier used in log lines, usually the session id
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> SessionResult<CallState> {
        let caller = self
            .caller
            .ok_or_else(|| SessionError::MissingCapability("caller role must be set".into()))?;
        let has_media = self
            .has_media
            .ok_or_else(|| SessionError::MissingCapability("has_media predicate is required".into()))?;
        self.timeouts.validate()?;
        let runtime = Handle::try_current().map_err(|_| {
            SessionError::MissingCapability("a tokio runtime is required for call timers".into())
        })?;

        let core = Core {
            state: CallStateName::Idle,
            flags: CallFlags::new(caller),
            modify_received: false,
            connected_caller: caller,
            timers: TimerSet::default(),
            pending: VecDeque::new(),
            draining: false,
        };

        Ok(CallState {
            inner: Arc::new(Inner {
                label: self.label.unwrap_or_else(|| "call".to_string()),
                kind: self.kind.unwrap_or(SessionKind::Call),
                timeouts: self.timeouts,
                has_media,
                runtime,
                core: Mutex::new(core),
                emitter: EventEmitter::new(),
            }),
        })
    }
}

impl CallState {
    pub fn builder() -> CallStateBuilder {
        CallStateBuilder::default()
    }

    /// Fire an event into the machine. Events that are not valid in the current
    /// state are ignored.
    pub fn dispatch(&self, event: CallEvent) {
        // The predicate belongs to the owner and may take its own locks, so it is
        // sampled before ours is taken.
        let has_media = matches!(event, CallEvent::Reject { .. }) && (self.inner.has_media)();

        let drain = {
            let mut core = self.inner.core.lock();
            self.step(&mut core, event, has_media);
            core.claim_drain()
        };
        if drain {
            self.drain();
        }
    }

    fn step(&self, core: &mut Core, event: CallEvent, has_media: bool) {
        let ctx = TableContext {
            kind: self.inner.kind,
            has_media,
            modify_received: core.modify_received,
        };

        let Some(transition) = resolve(core.state, &core.flags, &ctx, &event) else {
            debug!(
                session = %self.inner.label,
                state = %core.state,
                event = %event.kind(),
                "ignoring event not valid in current state"
            );
            return;
        };

        debug!(session = %self.inner.label, state = %core.state, ?event, "dispatch");
        for effect in transition.effects {
            self.apply(core, effect);
        }

        if let Some(next) = transition.next {
            self.enter(core, next);
        }

        if let Some(reason) = transition.auto_reject {
            info!(session = %self.inner.label, %reason, "rejecting session automatically");
            self.apply(core, Effect::RecordHangupReason(reason));
            self.enter(core, CallStateName::Terminated);
        }
    }

    fn apply(&self, core: &mut Core, effect: Effect) {
        match effect {
            Effect::SetLocalMediaApproval => core.flags.has_local_media_approval = true,
            Effect::SetLocalMedia => core.flags.has_local_media = true,
            Effect::SetSentSdp => core.flags.sent_sdp = true,
            Effect::SetProcessedRemoteSdp => core.flags.processed_remote_sdp = true,
            Effect::SetReceivedBye => core.flags.received_bye = true,
            Effect::RecordHangupReason(reason) => {
                if core.flags.hangup_reason.is_none() {
                    core.flags.hangup_reason = Some(reason);
                }
            }
            Effect::ArmTimer(kind) => self.arm(core, kind),
            Effect::MarkModifyReceived(received) => core.modify_received = received,
            Effect::SetCaller(caller) => core.flags.caller = caller,
            Effect::RestoreRole => core.flags.caller = core.connected_caller,
        }
    }

    fn enter(&self, core: &mut Core, next: CallStateName) {
        let previous = core.state;

        core.timers.disarm_all();
        core.pending.push_back(StateEvent {
            state: previous,
            phase: StatePhase::Exit,
            previous: None,
            caller: core.flags.caller,
            hangup_reason: core.flags.hangup_reason.clone(),
        });

        core.state = next;
        info!(session = %self.inner.label, from = %previous, to = %next, "state transition");

        match next {
            CallStateName::Preparing => {
                core.flags.reset_negotiation();
                if previous != CallStateName::Modifying {
                    self.arm(core, TimerKind::Answer);
                }
            }
            CallStateName::Connecting => self.arm(core, TimerKind::Connection),
            CallStateName::Connected => {
                core.connected_caller = core.flags.caller;
                core.modify_received = false;
            }
            CallStateName::Modifying => self.arm(core, TimerKind::Modify),
            _ => {}
        }

        core.pending.push_back(StateEvent {
            state: next,
            phase: StatePhase::Entry,
            previous: Some(previous),
            caller: core.flags.caller,
            hangup_reason: core.flags.hangup_reason.clone(),
        });
    }

    fn arm(&self, core: &mut Core, kind: TimerKind) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let after = self.inner.timeouts.duration(kind);
        core.timers.arm(&self.inner.runtime, kind, after, move |generation| {
            if let Some(inner) = weak.upgrade() {
                CallState { inner }.expire(kind, generation);
            }
        });
    }

    fn expire(&self, kind: TimerKind, generation: u64) {
        let drain = {
            let mut core = self.inner.core.lock();
            if !core.timers.claim(kind, generation) {
                return;
            }
            error!(session = %self.inner.label, state = %core.state, ?kind, "timer expired");
            self.step(&mut core, CallEvent::hangup(kind.hangup_reason()), false);
            core.claim_drain()
        };
        if drain {
            self.drain();
        }
    }

    /// Deliver queued state events until the queue is empty. Events queued by
    /// other threads meanwhile are delivered here too.
    fn drain(&self) {
        loop {
            let event = {
                let mut core = self.inner.core.lock();
                match core.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        core.draining = false;
                        return;
                    }
                }
            };
            self.inner.emitter.fire(&event.name(), &event);
        }
    }

    pub fn current_state(&self) -> CallStateName {
        self.inner.core.lock().state
    }

    pub fn is_state(&self, state: CallStateName) -> bool {
        self.current_state() == state
    }

    pub fn flags(&self) -> CallFlags {
        self.inner.core.lock().flags.clone()
    }

    pub fn caller(&self) -> bool {
        self.inner.core.lock().flags.caller
    }

    pub fn kind(&self) -> SessionKind {
        self.inner.kind
    }

    /// Runtime the machine was built on
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub fn hangup_reason(&self) -> Option<String> {
        self.inner.core.lock().flags.hangup_reason.clone()
    }

    /// Whether this side received the renegotiation currently in progress
    pub fn modify_received(&self) -> bool {
        self.inner.core.lock().modify_received
    }

    /// True while a renegotiation is underway on a session whose media still flows.
    pub fn is_modifying(&self) -> bool {
        let negotiating = self.current_state().is_negotiating();
        negotiating && (self.inner.has_media)()
    }

    pub fn has_media(&self) -> bool {
        (self.inner.has_media)()
    }

    pub fn has_armed_timer(&self, kind: TimerKind) -> bool {
        self.inner.core.lock().timers.is_armed(kind)
    }

    /// Record that this side has sent its SDP (the callee's answer).
    pub fn mark_sent_sdp(&self) {
        let mut core = self.inner.core.lock();
        if !core.state.is_terminal() {
            core.flags.sent_sdp = true;
        }
    }

    /// Record that the remote SDP has been applied (the callee's offer).
    pub fn mark_processed_remote_sdp(&self) {
        let mut core = self.inner.core.lock();
        if !core.state.is_terminal() {
            core.flags.processed_remote_sdp = true;
        }
    }

    pub fn listen<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.listen(event, callback)
    }

    /// Register a listener that does not count as an application listener.
    pub fn listen_internal<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.listen_internal(event, callback)
    }

    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.once(event, callback)
    }

    pub fn ignore(&self, event: &str, id: ListenerId) -> bool {
        self.inner.emitter.ignore(event, id)
    }

    pub fn ignore_all(&self) {
        self.inner.emitter.ignore_all();
    }
}
