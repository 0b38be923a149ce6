//! Runtime → scheduler registry
//!
//! Hosts normally own a [`SchedulerRegistry`] next to their runtimes and pass
//! it where listeners are registered. [`SchedulerRegistry::global`] exists for
//! hosts that have nowhere to keep one.

use crate::{EventScheduler, SchedulerSettings};
use dashmap::DashMap;
use gloo_core::{RuntimeId, StackBridge};
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL: Lazy<SchedulerRegistry> = Lazy::new(SchedulerRegistry::default);

/// One [`EventScheduler`] per runtime, created on first access.
#[derive(Debug)]
pub struct SchedulerRegistry {
    settings: SchedulerSettings,
    schedulers: DashMap<RuntimeId, Arc<EventScheduler>>,
}

impl SchedulerRegistry {
    /// Schedulers created by this registry share `settings`.
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            schedulers: DashMap::new(),
        }
    }

    pub fn global() -> &'static SchedulerRegistry {
        &GLOBAL
    }

    /// The scheduler for `runtime`. Concurrent first calls for the same
    /// runtime all get the same instance.
    pub fn scheduler_for(&self, runtime: RuntimeId) -> Arc<EventScheduler> {
        if let Some(existing) = self.schedulers.get(&runtime) {
            return Arc::clone(existing.value());
        }

        let entry = self.schedulers.entry(runtime).or_insert_with(|| {
            tracing::debug!(%runtime, "creating event scheduler");
            Arc::new(EventScheduler::new(runtime, self.settings.clone()))
        });
        Arc::clone(entry.value())
    }

    /// The scheduler for the runtime behind `bridge`.
    pub fn current(&self, bridge: &dyn StackBridge) -> Arc<EventScheduler> {
        self.scheduler_for(bridge.runtime_id())
    }

    pub fn get(&self, runtime: RuntimeId) -> Option<Arc<EventScheduler>> {
        self.schedulers
            .get(&runtime)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new(SchedulerSettings::default())
    }
}
