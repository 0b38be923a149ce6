//! Per-emitter event queue
//!
//! Producers on any thread push argument tuples; the tick thread drains them.
//! The queue is unbounded: a producer that outpaces the tick rate grows memory
//! instead of blocking or dropping events.

use gloo_core::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// FIFO of argument tuples.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<Vec<Value>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tuple. Safe from any thread; never touches the runtime.
    pub fn push(&self, args: Vec<Value>) {
        self.lock().push_back(args);
    }

    /// Remove and return every queued tuple in raise order.
    pub fn drain_all(&self) -> Vec<Vec<Value>> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into()
    }

    /// Put undelivered tuples back ahead of anything queued since the drain.
    pub fn requeue_front(&self, events: Vec<Vec<Value>>) {
        if events.is_empty() {
            return;
        }
        let mut queue = self.lock();
        for args in events.into_iter().rev() {
            queue.push_front(args);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking producer cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<Value>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
