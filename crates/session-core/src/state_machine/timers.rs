//! Single-shot negotiation timers owned by one state machine.
//!
//! Every arm bumps a generation counter. The expiry callback receives the
//! generation it was armed with, and the machine only acts on it if that
//! generation is still the armed one for the kind.

use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::state_table::TimerKind;

#[derive(Default)]
pub(crate) struct TimerSet {
    generation: u64,
    armed: HashMap<TimerKind, (u64, JoinHandle<()>)>,
}

impl TimerSet {
    pub fn arm<F>(&mut self, runtime: &Handle, kind: TimerKind, after: Duration, on_expire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.generation += 1;
        let generation = self.generation;
        debug!(?kind, secs = after.as_secs_f64(), "setting timer");
        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            on_expire(generation);
        });

        if let Some((_, previous)) = self.armed.insert(kind, (generation, task)) {
            previous.abort();
        }
    }

    /// Claim an expired timer. Returns false if it was disarmed or re-armed since.
    pub fn claim(&mut self, kind: TimerKind, generation: u64) -> bool {
        match self.armed.get(&kind) {
            Some((armed, _)) if *armed == generation => {
                self.armed.remove(&kind);
                true
            }
            _ => false,
        }
    }

    pub fn disarm_all(&mut self) {
        for (kind, (_, task)) in self.armed.drain() {
            debug!(?kind, "clearing timer");
            task.abort();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
