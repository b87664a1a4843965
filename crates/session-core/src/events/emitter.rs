//! Named publish/subscribe primitive used by every stateful object.
//!
//! Listeners are keyed by event name. Dispatch works on a snapshot of the
//! listener list, so a listener may add or remove listeners (including itself)
//! while an event is being delivered. One-time listeners are removed before they
//! run. A listener that panics is logged and the remaining listeners still run.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Handle returned by `listen`/`once`, used to remove one listener
pub type ListenerId = u64;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: ListenerId,
    callback: Callback<E>,
    once: bool,
    internal: bool,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
            once: self.once,
            internal: self.internal,
        }
    }
}

/// Answers "does anyone handle this event?" without exposing the emitter itself.
///
/// The state machine consults a probe when a callee session starts, to reject
/// inbound sessions nobody is listening for.
pub trait ListenerProbe: Send + Sync {
    fn has_listeners(&self, event: &str) -> bool;
}

/// Probe with a fixed answer, handy for callers and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl ListenerProbe for StaticProbe {
    fn has_listeners(&self, _event: &str) -> bool {
        self.0
    }
}

pub struct EventEmitter<E> {
    listeners: RwLock<HashMap<String, Vec<Entry<E>>>>,
    next_id: AtomicU64,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an application listener for `event`.
    pub fn listen<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(event, Arc::new(callback), false, false)
    }

    /// Register a library-internal listener. Internal listeners receive events
    /// but do not count towards `has_listeners`.
    pub fn listen_internal<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(event, Arc::new(callback), false, true)
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(event, Arc::new(callback), true, false)
    }

    fn add(&self, event: &str, callback: Callback<E>, once: bool, internal: bool) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Entry {
                id,
                callback,
                once,
                internal,
            });
        id
    }

    /// Remove one listener. Returns whether it was registered.
    pub fn ignore(&self, event: &str, id: ListenerId) -> bool {
        let mut map = self.listeners.write();
        let Some(list) = map.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| entry.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(event);
        }
        removed
    }

    /// Remove every listener for `event`.
    pub fn ignore_event(&self, event: &str) {
        self.listeners.write().remove(event);
    }

    /// Remove every listener for every event.
    pub fn ignore_all(&self) {
        self.listeners.write().clear();
    }

    /// Whether any non-internal listener is registered for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners
            .read()
            .get(event)
            .map(|list| list.iter().any(|entry| !entry.internal))
            .unwrap_or(false)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map(Vec::len).unwrap_or(0)
    }

    /// Deliver `payload` to every listener of `event` on the current task.
    ///
    /// Returns the number of listeners invoked.
    pub fn fire(&self, event: &str, payload: &E) -> usize {
        let snapshot = {
            let mut map = self.listeners.write();
            let Some(list) = map.get_mut(event) else {
                trace!(event, "no listeners");
                return 0;
            };
            let snapshot = list.clone();
            list.retain(|entry| !entry.once);
            if list.is_empty() {
                map.remove(event);
            }
            snapshot
        };

        for entry in &snapshot {
            let callback = Arc::clone(&entry.callback);
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                error!(event, listener = entry.id, "event listener panicked");
            }
        }
        snapshot.len()
    }
}

impl<E> EventEmitter<E>
where
    E: Send + Sync + 'static,
{
    /// Deliver `payload` on a fresh task instead of the current one.
    ///
    /// Falls back to synchronous delivery when no tokio runtime is available.
    pub fn fire_deferred(self: &Arc<Self>, event: &str, payload: E) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let emitter = Arc::clone(self);
                let event = event.to_string();
                handle.spawn(async move {
                    emitter.fire(&event, &payload);
                });
            }
            Err(_) => {
                warn!(event, "no runtime for deferred event, firing inline");
                self.fire(event, &payload);
            }
        }
    }
}

impl<E> ListenerProbe for EventEmitter<E>
where
    E: Send + Sync,
{
    fn has_listeners(&self, event: &str) -> bool {
        EventEmitter::has_listeners(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn fire_reaches_every_listener() {
        let emitter = EventEmitter::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = total.clone();
            emitter.listen("tick", move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        assert_eq!(emitter.fire("tick", &2), 3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
        assert_eq!(emitter.fire("other", &2), 0);
    }

    #[test]
    fn once_listener_runs_a_single_time() {
        let emitter = EventEmitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        emitter.once("ready", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emitter.fire("ready", &());
        emitter.fire("ready", &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!emitter.has_listeners("ready"));
    }

    #[test]
    fn internal_listeners_are_not_counted() {
        let emitter = EventEmitter::<()>::new();
        emitter.listen_internal("call", |_| {});
        assert!(!emitter.has_listeners("call"));
        assert_eq!(emitter.listener_count("call"), 1);

        emitter.listen("call", |_| {});
        assert!(emitter.has_listeners("call"));
    }

    #[test]
    fn ignore_removes_only_the_named_listener() {
        let emitter = EventEmitter::<()>::new();
        let first = emitter.listen("hangup", |_| {});
        let _second = emitter.listen("hangup", |_| {});

        assert!(emitter.ignore("hangup", first));
        assert!(!emitter.ignore("hangup", first));
        assert_eq!(emitter.listener_count("hangup"), 1);

        emitter.ignore_event("hangup");
        assert_eq!(emitter.listener_count("hangup"), 0);
    }

    #[test]
    fn ignore_all_clears_everything() {
        let emitter = EventEmitter::<()>::new();
        emitter.listen("a", |_| {});
        emitter.listen("b", |_| {});
        emitter.ignore_all();
        assert!(!emitter.has_listeners("a"));
        assert!(!emitter.has_listeners("b"));
    }

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let id_slot = Arc::new(AtomicU64::new(0));

        let weak = Arc::downgrade(&emitter);
        let slot = id_slot.clone();
        let counter = hits.clone();
        let id = emitter.listen("ping", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(emitter) = weak.upgrade() {
                emitter.ignore("ping", slot.load(Ordering::SeqCst));
            }
        });
        id_slot.store(id, Ordering::SeqCst);

        emitter.fire("ping", &());
        emitter.fire("ping", &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_others() {
        let emitter = EventEmitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        emitter.listen("boom", |_| panic!("listener failure"));
        let counter = hits.clone();
        emitter.listen("boom", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(emitter.fire("boom", &()), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deferred_fire_runs_on_a_later_task() {
        let emitter = Arc::new(EventEmitter::<u8>::new());
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = parking_lot::Mutex::new(Some(tx));
        emitter.listen("later", move |value| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(*value);
            }
        });

        emitter.fire_deferred("later", 7);
        assert_eq!(rx.await.unwrap(), 7);
    }
}
