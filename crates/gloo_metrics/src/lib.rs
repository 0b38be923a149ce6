//! Gloo Metrics - tick and dispatch instrumentation
//!
//! Counters and tick timing for the event scheduler. With the `metrics`
//! feature disabled every type below is a zero-sized stub and every call
//! compiles to nothing.
//!
//! # Usage
//!
//! ```ignore
//! use gloo_metrics::{Counter, TickTimer};
//!
//! let mut timer = TickTimer::new(120);
//! let mut counter = Counter::new();
//! let start = std::time::Instant::now();
//! counter.increment("events_dispatched", 3);
//! timer.record(start.elapsed());
//! println!("avg tick: {:.3}ms", timer.average_ms());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod sample_window;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use sample_window::SampleWindow;
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug)]
pub struct SampleWindow<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> SampleWindow<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _sample: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct TickTimer;

#[cfg(not(feature = "metrics"))]
impl TickTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn record(&mut self, _elapsed: std::time::Duration) {}
    pub fn ticks(&self) -> u64 { 0 }
    pub fn average(&self) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn average_ms(&self) -> f64 { 0.0 }
    pub fn slowest(&self) -> std::time::Duration { std::time::Duration::ZERO }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_api_available_in_every_configuration() {
        let mut timer = super::TickTimer::new(8);
        let mut counter = super::Counter::new();
        counter.increment("ticks", 1);
        timer.record(std::time::Duration::from_millis(2));
        let _ = timer.slowest();
        let mut window = super::SampleWindow::<f64>::new(4);
        window.push(1.0);
        let _ = timer.average_ms();
    }
}
