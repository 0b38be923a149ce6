//! Gloo Runtime
//!
//! Demo host: worker threads raise events on a shared emitter while the main
//! thread owns the runtime and drives its per-frame hook.
//!
//! Usage: `gloo [settings.json]`

use anyhow::{Context, Result};
use gloo_core::{MemoryState, StackBridge, Value};
use gloo_event::{Emitter, ListenerMode, SchedulerRegistry, SchedulerSettings};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HostSettings {
    /// Upper bound on frames before the host gives up.
    max_ticks: u32,
    tick_interval_ms: u64,
    workers: usize,
    events_per_worker: usize,
    scheduler: SchedulerSettings,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            max_ticks: 600,
            tick_interval_ms: 16,
            workers: 4,
            events_per_worker: 25,
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl HostSettings {
    fn from_args() -> Result<Self> {
        let Some(path) = std::env::args().nth(1) else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading host settings from {path}"))?;
        serde_json::from_str(&text).with_context(|| format!("parsing host settings in {path}"))
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Gloo v{}", gloo_core::VERSION);
    let settings = HostSettings::from_args()?;
    tracing::debug!(?settings, "host settings");

    let mut state = MemoryState::new();
    let registry = SchedulerRegistry::new(settings.scheduler.clone());
    let emitter = Emitter::shared("worker_progress");

    let on_progress = state.create_function(|state| {
        let worker = Value::from_stack(state, 1)?;
        let step = Value::from_stack(state, 2)?;
        tracing::trace!(target: "gloo::script", %worker, %step, "progress");
        Ok(0)
    });
    let on_first = state.create_function(|state| {
        let worker = Value::from_stack(state, 1)?;
        state.push_globals();
        state.get_field(-1, "print")?;
        state.push_string(&format!("first event came from worker {worker}"));
        state.call(1, 0)?;
        state.pop(1);
        Ok(0)
    });

    emitter
        .listen(&mut state, &registry, on_progress, ListenerMode::Persistent)
        .context("registering progress listener")?;
    emitter
        .listen(&mut state, &registry, on_first, ListenerMode::Once)
        .context("registering first-event listener")?;

    let workers: Vec<_> = (0..settings.workers)
        .map(|worker| {
            let emitter = Arc::clone(&emitter);
            let events = settings.events_per_worker;
            thread::spawn(move || {
                for step in 0..events {
                    emitter.emit((worker, step));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    let interval = Duration::from_millis(settings.tick_interval_ms);
    let mut frames = 0;
    while frames < settings.max_ticks {
        state.run_hook(&settings.scheduler.hook_event)?;
        frames += 1;

        if workers.iter().all(|worker| worker.is_finished()) && emitter.pending() == 0 {
            break;
        }
        thread::sleep(interval);
    }

    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
    }

    let scheduler = registry.current(&state);
    tracing::info!(
        frames,
        ticks = scheduler.ticks(),
        events = scheduler.counter("events_dispatched"),
        failures = scheduler.counter("listener_failures"),
        avg_tick_ms = scheduler.average_tick_ms(),
        slowest_tick_ms = scheduler.slowest_tick().as_secs_f64() * 1000.0,
        undelivered = emitter.pending(),
        "run complete"
    );

    Ok(())
}
