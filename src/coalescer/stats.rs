//! Counters maintained by the coalescer worker.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, written by the worker and readable from any thread.
#[derive(Debug, Default)]
pub struct CoalescerStats {
    input_events: AtomicU64,
    heartbeat_signals: AtomicU64,
    debounce_signals: AtomicU64,
    idle_debounce_ticks: AtomicU64,
}

impl CoalescerStats {
    pub(crate) fn record_input(&self) {
        self.input_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_heartbeat(&self) {
        self.heartbeat_signals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_debounce(&self) {
        self.debounce_signals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_tick(&self) {
        self.idle_debounce_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            input_events: self.input_events.load(Ordering::Relaxed),
            heartbeat_signals: self.heartbeat_signals.load(Ordering::Relaxed),
            debounce_signals: self.debounce_signals.load(Ordering::Relaxed),
            idle_debounce_ticks: self.idle_debounce_ticks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CoalescerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Raw change notifications received from the source.
    pub input_events: u64,
    /// Signals delivered because the heartbeat timer fired.
    pub heartbeat_signals: u64,
    /// Signals delivered because the debounce timer found the dirty flag set.
    pub debounce_signals: u64,
    /// Debounce ticks that found nothing to flush.
    pub idle_debounce_ticks: u64,
}

impl StatsSnapshot {
    /// Total signals handed to the consumer.
    pub fn signals_sent(&self) -> u64 {
        self.heartbeat_signals + self.debounce_signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = CoalescerStats::default();
        stats.record_input();
        stats.record_input();
        stats.record_heartbeat();
        stats.record_debounce();
        stats.record_idle_tick();

        let snap = stats.snapshot();
        assert_eq!(snap.input_events, 2);
        assert_eq!(snap.heartbeat_signals, 1);
        assert_eq!(snap.debounce_signals, 1);
        assert_eq!(snap.idle_debounce_ticks, 1);
        assert_eq!(snap.signals_sent(), 2);
    }
}
