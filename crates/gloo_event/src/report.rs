use crate::ListenerId;
use gloo_core::BridgeError;

/// A listener call that failed while its failure was isolated.
#[derive(Debug)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    pub error: BridgeError,
}

/// What one dispatch, emitter think, or scheduler tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub emitters_visited: usize,
    pub emitters_pruned: usize,
    pub events_dispatched: usize,
    pub listener_calls: usize,
    pub failures: Vec<ListenerFailure>,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.emitters_visited += other.emitters_visited;
        self.emitters_pruned += other.emitters_pruned;
        self.events_dispatched += other.events_dispatched;
        self.listener_calls += other.listener_calls;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
