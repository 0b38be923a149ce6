//! Gloo Event
//!
//! Cross-thread events for scripted listeners:
//! - [`Emitter`]: raise events from any thread, register listeners from the runtime
//! - [`EventScheduler`]: one per runtime, delivers queued events on the runtime's tick
//! - [`SchedulerRegistry`]: finds or creates the scheduler for a runtime
//!
//! ## Threading
//!
//! `Emitter::emit` only touches the emitter's queue and never the runtime.
//! Listeners are invoked exclusively from [`EventScheduler::tick`], which the
//! runtime calls through its per-frame hook on its own thread.
//!
//! ## Features
//!
//! - `metrics`: tick timing and dispatch counters (default)

mod emitter;
mod listeners;
mod queue;
mod registry;
mod report;
mod scheduler;
mod settings;

pub use emitter::{Emitter, EventSource};
pub use listeners::{FailurePolicy, ListenerId, ListenerMode, ListenerRegistry};
pub use queue::EventQueue;
pub use registry::SchedulerRegistry;
pub use report::{ListenerFailure, TickReport};
pub use scheduler::EventScheduler;
pub use settings::{SchedulerSettings, SettingsError};
