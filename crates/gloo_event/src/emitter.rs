//! Event emitters
//!
//! An [`Emitter`] pairs an [`EventQueue`] with a [`ListenerRegistry`]. Native
//! code on any thread calls [`Emitter::emit`]; listeners run later, when the
//! scheduler watching the emitter ticks on the runtime's callback thread.

use crate::{
    EventQueue, FailurePolicy, ListenerId, ListenerMode, ListenerRegistry, SchedulerRegistry,
    TickReport,
};
use gloo_core::{Callable, IntoArgs, Result, StackBridge};
use std::sync::Arc;

/// Anything a scheduler can drain on its tick.
pub trait EventSource: Send + Sync {
    /// Deliver every queued event. Runs on the runtime's callback thread.
    fn think(&self, bridge: &mut dyn StackBridge, policy: FailurePolicy) -> Result<TickReport>;
}

#[derive(Debug)]
pub struct Emitter {
    name: String,
    queue: EventQueue,
    listeners: ListenerRegistry,
}

impl Emitter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: EventQueue::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Schedulers only hold weak references, so emitters live behind an `Arc`.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue an event. Safe from any thread.
    pub fn emit(&self, args: impl IntoArgs) {
        self.queue.push(args.into_args());
    }

    pub fn on(&self, callable: Callable) -> ListenerId {
        self.listeners.add(callable, ListenerMode::Persistent)
    }

    pub fn once(&self, callable: Callable) -> ListenerId {
        self.listeners.add(callable, ListenerMode::Once)
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn remove_all(&self) {
        self.listeners.remove_all();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.count()
    }

    /// Events queued but not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Register a listener from the runtime side.
    ///
    /// Installs the runtime's tick hook if needed, adds the listener, and
    /// makes sure the runtime's scheduler watches this emitter. Nothing is
    /// registered if the hook cannot be installed.
    pub fn listen(
        self: &Arc<Self>,
        bridge: &mut dyn StackBridge,
        registry: &SchedulerRegistry,
        callable: Callable,
        mode: ListenerMode,
    ) -> Result<ListenerId> {
        let scheduler = registry.current(bridge);
        scheduler.register_hook(bridge)?;
        let id = self.listeners.add(callable, mode);
        scheduler.watch(self);
        Ok(id)
    }
}

impl EventSource for Emitter {
    fn think(&self, bridge: &mut dyn StackBridge, policy: FailurePolicy) -> Result<TickReport> {
        let mut events = self.queue.drain_all().into_iter();
        let mut report = TickReport::default();
        let mut failure = None;

        for args in events.by_ref() {
            tracing::trace!(emitter = %self.name, args = args.len(), "dispatching event");
            match self.listeners.dispatch(bridge, &args, policy) {
                Ok(dispatched) => {
                    report.events_dispatched += 1;
                    report.merge(dispatched);
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        match failure {
            Some(error) => {
                self.queue.requeue_front(events.collect());
                Err(error)
            }
            None => Ok(report),
        }
    }
}
