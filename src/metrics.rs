// Poll loop metrics
//
// Lightweight counters describing how the event bridge spends its cycles

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters updated by [`EventBridge`](crate::bridge::EventBridge) on every cycle.
///
/// Atomics keep the type shareable with a reporting thread even though the
/// loop itself is single-threaded.
#[derive(Debug)]
pub struct BridgeMetrics {
    /// Poll cycles completed
    pub cycles: AtomicU64,

    /// Envelopes handed to the router
    pub envelopes_dispatched: AtomicU64,

    /// Cycles whose wait was not allowed to block
    pub zero_timeout_waits: AtomicU64,

    /// Cycles whose wait was bounded by a timer deadline
    pub bounded_waits: AtomicU64,

    /// Waits that failed (interrupted or otherwise) and counted as idle
    pub failed_waits: AtomicU64,

    /// Timer callbacks run, across both checks of a cycle
    pub timer_callbacks: AtomicU64,

    /// Layout flushes performed at the end of a cycle
    pub reformat_flushes: AtomicU64,

    start_time: Instant,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            envelopes_dispatched: AtomicU64::new(0),
            zero_timeout_waits: AtomicU64::new(0),
            bounded_waits: AtomicU64::new(0),
            failed_waits: AtomicU64::new(0),
            timer_callbacks: AtomicU64::new(0),
            reformat_flushes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.envelopes_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_zero_timeout(&self) {
        self.zero_timeout_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bounded_wait(&self) {
        self.bounded_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_wait(&self) {
        self.failed_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timer_callbacks(&self, count: usize) {
        self.timer_callbacks
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.reformat_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average envelopes dispatched per cycle
    pub fn dispatch_ratio(&self) -> f64 {
        let cycles = self.cycles.load(Ordering::Relaxed);
        if cycles > 0 {
            self.envelopes_dispatched.load(Ordering::Relaxed) as f64 / cycles as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Event Bridge Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Cycles: {}, envelopes dispatched: {} ({:.2} per cycle)",
            self.cycles.load(Ordering::Relaxed),
            self.envelopes_dispatched.load(Ordering::Relaxed),
            self.dispatch_ratio()
        );
        tracing::info!(
            "Waits: {} non-blocking, {} deadline-bounded, {} failed",
            self.zero_timeout_waits.load(Ordering::Relaxed),
            self.bounded_waits.load(Ordering::Relaxed),
            self.failed_waits.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Timer callbacks: {}, reformat flushes: {}",
            self.timer_callbacks.load(Ordering::Relaxed),
            self.reformat_flushes.load(Ordering::Relaxed)
        );
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
