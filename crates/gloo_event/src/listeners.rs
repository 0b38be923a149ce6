// listeners.rs - Per-emitter listener registry
//
// Dispatch snapshots the listener list and calls into the runtime with the
// lock released, so a listener may register or clear listeners on its own
// emitter. Listeners added mid-dispatch first fire on the next event.

use crate::{ListenerFailure, TickReport};
use gloo_core::{BridgeError, Callable, Result, StackBridge, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Fires for every event until removed.
    Persistent,
    /// Removed right after its first invocation.
    Once,
}

/// What happens when a listener call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep delivering.
    Isolate,
    /// Stop at the first failure and return it.
    Propagate,
}

#[derive(Debug, Clone)]
struct Listener {
    id: ListenerId,
    callable: Callable,
    mode: ListenerMode,
}

/// Ordered listener list with one-shot support.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Duplicates are kept and fire once per registration.
    pub fn add(&self, callable: Callable, mode: ListenerMode) -> ListenerId {
        let id = ListenerId::next();
        self.lock().push(Listener { id, callable, mode });
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    pub fn remove_all(&self) {
        self.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Call every listener, in registration order, with `args` as positional
    /// arguments. Must run on the runtime's callback thread.
    pub fn dispatch(
        &self,
        bridge: &mut dyn StackBridge,
        args: &[Value],
        policy: FailurePolicy,
    ) -> Result<TickReport> {
        let snapshot = self.lock().clone();
        let mut fired_once = Vec::new();
        let mut report = TickReport::default();

        for listener in &snapshot {
            let outcome = invoke(bridge, &listener.callable, args);
            report.listener_calls += 1;
            if listener.mode == ListenerMode::Once {
                fired_once.push(listener.id);
            }

            if let Err(error) = outcome {
                match policy {
                    FailurePolicy::Isolate => {
                        tracing::warn!(listener = %listener.id, %error, "listener failed");
                        report.failures.push(ListenerFailure {
                            listener: listener.id,
                            error,
                        });
                    }
                    FailurePolicy::Propagate => {
                        self.retire(&fired_once);
                        return Err(BridgeError::Listener {
                            listener: listener.id.get(),
                            source: Box::new(error),
                        });
                    }
                }
            }
        }

        self.retire(&fired_once);
        Ok(report)
    }

    fn retire(&self, fired: &[ListenerId]) {
        if fired.is_empty() {
            return;
        }
        self.lock()
            .retain(|listener| !fired.contains(&listener.id));
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invoke(bridge: &mut dyn StackBridge, callable: &Callable, args: &[Value]) -> Result<()> {
    let top = bridge.top();
    let result = push_and_call(bridge, callable, args);
    if result.is_err() {
        bridge.set_top(top);
    }
    result
}

fn push_and_call(bridge: &mut dyn StackBridge, callable: &Callable, args: &[Value]) -> Result<()> {
    bridge.push_function(callable.clone());
    for arg in args {
        arg.to_stack(bridge)?;
    }
    bridge.call(args.len() as i32, 0)
}
