//! Per-runtime event scheduler
//!
//! Holds weak references to every watched emitter and installs one recurring
//! hook in its runtime. Each hook invocation is a tick: live emitters are
//! drained and dispatched, dead ones are pruned.

use crate::{EventSource, SchedulerSettings, TickReport};
use gloo_core::{BridgeError, Callable, Result, RuntimeId, StackBridge, TypeTag};
use gloo_metrics::{Counter, TickTimer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct SchedulerStats {
    counter: Counter,
    timer: TickTimer,
}

pub struct EventScheduler {
    id: u64,
    runtime: RuntimeId,
    settings: SchedulerSettings,
    hook_installed: AtomicBool,
    sources: Mutex<Vec<Weak<dyn EventSource>>>,
    stats: Mutex<SchedulerStats>,
}

impl EventScheduler {
    pub fn new(runtime: RuntimeId, settings: SchedulerSettings) -> Self {
        Self {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            runtime,
            settings,
            hook_installed: AtomicBool::new(false),
            sources: Mutex::new(Vec::new()),
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Identifier the tick hook is registered under. Stable for the
    /// scheduler's lifetime, so re-registering replaces rather than adds.
    pub fn hook_id(&self) -> String {
        format!("{}{}", self.settings.hook_id_prefix, self.id)
    }

    pub fn is_hook_installed(&self) -> bool {
        self.hook_installed.load(Ordering::Acquire)
    }

    /// Install the tick hook: `<library>.<add>(<event>, <hook id>, tick)`.
    ///
    /// Idempotent. Must run on the runtime's callback thread. The stack is
    /// left as it was found, whether or not installation succeeds.
    pub fn register_hook(self: &Arc<Self>, bridge: &mut dyn StackBridge) -> Result<()> {
        if self.is_hook_installed() {
            return Ok(());
        }
        if bridge.runtime_id() != self.runtime {
            return Err(BridgeError::runtime(format!(
                "scheduler for {} cannot hook into {}",
                self.runtime,
                bridge.runtime_id()
            )));
        }

        let top = bridge.top();
        let result = self.install_hook(bridge);
        bridge.set_top(top);
        result?;

        self.hook_installed.store(true, Ordering::Release);
        tracing::debug!(
            runtime = %self.runtime,
            hook = %self.hook_id(),
            event = %self.settings.hook_event,
            "tick hook installed"
        );
        Ok(())
    }

    fn install_hook(self: &Arc<Self>, bridge: &mut dyn StackBridge) -> Result<()> {
        bridge.push_globals();
        bridge.get_field(-1, &self.settings.hook_library)?;
        let found = bridge.type_of(-1);
        if found != TypeTag::Table {
            return Err(BridgeError::mismatch(TypeTag::Table, found));
        }
        bridge.get_field(-1, &self.settings.hook_add)?;
        let found = bridge.type_of(-1);
        if found != TypeTag::Function {
            return Err(BridgeError::NotCallable { found });
        }

        let scheduler = Arc::downgrade(self);
        let tick = Callable::native(move |bridge| {
            if let Some(scheduler) = scheduler.upgrade() {
                scheduler.tick(bridge)?;
            }
            Ok(0)
        });

        bridge.push_string(&self.settings.hook_event);
        bridge.push_string(&self.hook_id());
        bridge.push_function(tick);
        bridge.call(3, 0)
    }

    /// Add an emitter to the watch set. Returns false if it was already there.
    pub fn register_emitter(&self, source: Weak<dyn EventSource>) -> bool {
        let mut sources = self.lock_sources();
        if sources.iter().any(|watched| Weak::ptr_eq(watched, &source)) {
            return false;
        }
        sources.push(source);
        tracing::debug!(runtime = %self.runtime, watched = sources.len(), "emitter registered");
        true
    }

    pub fn watch<E: EventSource + 'static>(&self, emitter: &Arc<E>) -> bool {
        let emitter: Arc<dyn EventSource> = emitter.clone();
        self.register_emitter(Arc::downgrade(&emitter))
    }

    /// Watched emitters, including dead ones not yet pruned.
    pub fn watch_count(&self) -> usize {
        self.lock_sources().len()
    }

    /// Drain and dispatch every live emitter, then prune dead ones.
    ///
    /// With failures isolated this only returns an error for a failure outside
    /// any listener. Otherwise the first listener failure ends the tick; the
    /// failing emitter keeps its undelivered events for the next one.
    pub fn tick(&self, bridge: &mut dyn StackBridge) -> Result<TickReport> {
        let start = Instant::now();
        let policy = self.settings.failure_policy();
        let snapshot = self.lock_sources().clone();
        let mut report = TickReport::default();
        let mut outcome = Ok(());

        for source in snapshot.iter().filter_map(Weak::upgrade) {
            report.emitters_visited += 1;
            match source.think(bridge, policy) {
                Ok(visited) => report.merge(visited),
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }

        report.emitters_pruned = self.prune();
        if report.emitters_pruned > 0 {
            tracing::debug!(
                runtime = %self.runtime,
                pruned = report.emitters_pruned,
                "pruned dead emitters"
            );
        }

        self.record(&report, outcome.is_err(), start.elapsed());
        outcome.map(|()| report)
    }

    fn prune(&self) -> usize {
        let mut sources = self.lock_sources();
        let before = sources.len();
        sources.retain(|source| source.strong_count() > 0);
        before - sources.len()
    }

    fn record(&self, report: &TickReport, aborted: bool, elapsed: Duration) {
        let mut stats = self.lock_stats();
        stats.timer.record(elapsed);
        stats.counter.increment("ticks", 1);
        stats
            .counter
            .increment("events_dispatched", report.events_dispatched as u64);
        stats
            .counter
            .increment("listener_failures", report.failures.len() as u64 + aborted as u64);
        stats
            .counter
            .increment("emitters_pruned", report.emitters_pruned as u64);
    }

    /// Cumulative tick counter; always 0 without the `metrics` feature.
    pub fn counter(&self, name: &str) -> u64 {
        self.lock_stats().counter.get(name)
    }

    pub fn ticks(&self) -> u64 {
        self.lock_stats().timer.ticks()
    }

    pub fn average_tick(&self) -> Duration {
        self.lock_stats().timer.average()
    }

    pub fn average_tick_ms(&self) -> f64 {
        self.lock_stats().timer.average_ms()
    }

    /// Slowest tick in the recent window.
    pub fn slowest_tick(&self) -> Duration {
        self.lock_stats().timer.slowest()
    }

    fn lock_sources(&self) -> MutexGuard<'_, Vec<Weak<dyn EventSource>>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, SchedulerStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScheduler")
            .field("id", &self.id)
            .field("runtime", &self.runtime)
            .field("hook_installed", &self.is_hook_installed())
            .field("watched", &self.watch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Emitter;
    use gloo_core::{MemoryState, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scheduler_for(state: &MemoryState) -> Arc<EventScheduler> {
        Arc::new(EventScheduler::new(
            state.runtime_id(),
            SchedulerSettings::default(),
        ))
    }

    #[test]
    fn test_register_hook_is_idempotent() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);

        scheduler.register_hook(&mut state).unwrap();
        scheduler.register_hook(&mut state).unwrap();

        assert!(scheduler.is_hook_installed());
        assert_eq!(state.hook_count("Think"), 1);
        assert_eq!(state.hook_ids("Think"), vec![scheduler.hook_id()]);
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_missing_hook_library_fails_cleanly() {
        let mut state = MemoryState::new();
        state.set_global("hook", &Value::Nil).unwrap();
        let scheduler = scheduler_for(&state);

        let err = scheduler.register_hook(&mut state).unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));
        assert!(!scheduler.is_hook_installed());
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_foreign_runtime_rejected() {
        let state = MemoryState::new();
        let mut other = MemoryState::new();
        let scheduler = scheduler_for(&state);
        assert!(scheduler.register_hook(&mut other).is_err());
        assert_eq!(other.hook_count("Think"), 0);
    }

    #[test]
    fn test_duplicate_watch_collapses() {
        let state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        let emitter = Emitter::shared("dup");

        assert!(scheduler.watch(&emitter));
        assert!(!scheduler.watch(&emitter));
        assert_eq!(scheduler.watch_count(), 1);
    }

    #[test]
    fn test_dead_emitter_pruned_without_error() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        let emitter = Emitter::shared("short-lived");
        scheduler.watch(&emitter);
        emitter.emit(("never delivered",));
        drop(emitter);

        let first = scheduler.tick(&mut state).unwrap();
        assert_eq!(first.emitters_visited, 0);
        assert_eq!(first.emitters_pruned, 1);

        scheduler.tick(&mut state).unwrap();
        assert_eq!(scheduler.watch_count(), 0);
    }

    #[test]
    fn test_hook_drives_ticks() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        scheduler.register_hook(&mut state).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let listener = {
            let seen = Rc::clone(&seen);
            state.create_function(move |state| {
                seen.borrow_mut().push(Value::from_stack(state, 1)?);
                Ok(0)
            })
        };

        let emitter = Emitter::shared("ping");
        emitter.on(listener);
        scheduler.watch(&emitter);
        emitter.emit((1,));
        emitter.emit((2,));

        state.run_hook("Think").unwrap();

        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn test_failing_emitter_does_not_block_others() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);

        let bad = Emitter::shared("bad");
        bad.on(state.create_function(|_| Err(BridgeError::runtime("boom"))));
        bad.emit(());

        let hits = Rc::new(RefCell::new(0));
        let good = Emitter::shared("good");
        good.on({
            let hits = Rc::clone(&hits);
            state.create_function(move |_| {
                *hits.borrow_mut() += 1;
                Ok(0)
            })
        });
        good.emit(());

        scheduler.watch(&bad);
        scheduler.watch(&good);

        let report = scheduler.tick(&mut state).unwrap();
        assert_eq!(report.emitters_visited, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bad.listener_count(), 1);
    }

    #[test]
    fn test_propagate_requeues_undelivered() {
        let mut state = MemoryState::new();
        let settings = SchedulerSettings {
            isolate_listener_failures: false,
            ..SchedulerSettings::default()
        };
        let scheduler = Arc::new(EventScheduler::new(state.runtime_id(), settings));

        let calls = Rc::new(RefCell::new(0));
        let emitter = Emitter::shared("strict");
        emitter.on({
            let calls = Rc::clone(&calls);
            state.create_function(move |_| {
                *calls.borrow_mut() += 1;
                if *calls.borrow() == 1 {
                    Err(BridgeError::runtime("first call fails"))
                } else {
                    Ok(0)
                }
            })
        });
        scheduler.watch(&emitter);
        emitter.emit(("a",));
        emitter.emit(("b",));

        let err = scheduler.tick(&mut state).unwrap_err();
        assert!(matches!(err, BridgeError::Listener { .. }));
        assert_eq!(emitter.pending(), 1);

        let report = scheduler.tick(&mut state).unwrap();
        assert_eq!(report.events_dispatched, 1);
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn test_once_listener_through_scheduler() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        let hits = Rc::new(RefCell::new(0));
        let emitter = Emitter::shared("once");
        emitter.once({
            let hits = Rc::clone(&hits);
            state.create_function(move |_| {
                *hits.borrow_mut() += 1;
                Ok(0)
            })
        });
        scheduler.watch(&emitter);

        emitter.emit(());
        scheduler.tick(&mut state).unwrap();
        emitter.emit(());
        scheduler.tick(&mut state).unwrap();

        assert_eq!(*hits.borrow(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_tick_records_stats() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        let emitter = Emitter::shared("counted");
        emitter.on(Callable::noop());
        scheduler.watch(&emitter);
        emitter.emit(());
        emitter.emit(());

        scheduler.tick(&mut state).unwrap();

        if cfg!(feature = "metrics") {
            assert_eq!(scheduler.ticks(), 1);
            assert_eq!(scheduler.counter("events_dispatched"), 2);
            assert!(scheduler.average_tick() <= scheduler.slowest_tick());
            assert!(scheduler.average_tick_ms() >= 0.0);
        } else {
            assert_eq!(scheduler.ticks(), 0);
        }
    }

    #[test]
    fn test_listener_registered_mid_tick_fires_next_event() {
        let mut state = MemoryState::new();
        let scheduler = scheduler_for(&state);
        let emitter = Emitter::shared("reentrant");
        let late_hits = Rc::new(RefCell::new(0));

        let late = {
            let late_hits = Rc::clone(&late_hits);
            state.create_function(move |_| {
                *late_hits.borrow_mut() += 1;
                Ok(0)
            })
        };
        let registering = {
            let emitter = Arc::clone(&emitter);
            state.create_function(move |_| {
                emitter.on(late.clone());
                Ok(0)
            })
        };
        emitter.once(registering);
        scheduler.watch(&emitter);

        emitter.emit(());
        emitter.emit(());
        scheduler.tick(&mut state).unwrap();

        // added during the first event, so only the second reaches it
        assert_eq!(*late_hits.borrow(), 1);
        assert_eq!(emitter.listener_count(), 1);
    }
}
