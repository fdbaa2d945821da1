//! Interface statistics.
//!
//! Counters are incremented from both task and interrupt context, so they
//! are atomics with relaxed ordering; increments are the only mutation and
//! nothing is ever read back for control flow.

use core::sync::atomic::{AtomicU32, Ordering};

/// Live counters of an interface.
///
/// Counters only ever increase, except through [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct Stats {
    tx_frames: AtomicU32,
    rx_frames: AtomicU32,
    tx_errors: AtomicU32,
    rx_errors: AtomicU32,
    rx_dropped: AtomicU32,
    non_matching: AtomicU32,
}

impl Stats {
    pub(crate) const fn new() -> Self {
        Self {
            tx_frames: AtomicU32::new(0),
            rx_frames: AtomicU32::new(0),
            tx_errors: AtomicU32::new(0),
            rx_errors: AtomicU32::new(0),
            rx_dropped: AtomicU32::new(0),
            non_matching: AtomicU32::new(0),
        }
    }

    pub(crate) fn count_tx_frame(&self) {
        self.tx_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_rx_frame(&self) {
        self.rx_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_tx_error(&self) {
        self.tx_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_rx_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_rx_dropped(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_non_matching(&self) {
        self.non_matching.fetch_add(1, Ordering::Relaxed);
    }

    /// A read-only copy of all counters, for telemetry.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            non_matching: self.non_matching.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.tx_frames.store(0, Ordering::Relaxed);
        self.rx_frames.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
        self.rx_errors.store(0, Ordering::Relaxed);
        self.rx_dropped.store(0, Ordering::Relaxed);
        self.non_matching.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time copy of the interface counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Frames successfully submitted for transmission.
    pub tx_frames: u32,
    /// Frame-received interrupts observed.
    pub rx_frames: u32,
    /// Transmit submissions that failed for a reason other than
    /// backpressure.
    pub tx_errors: u32,
    /// Receive descriptors completed with a hardware error.
    pub rx_errors: u32,
    /// Received frames dropped because no copy buffer could be allocated.
    pub rx_dropped: u32,
    /// Received frames discarded by the EtherType filter.
    pub non_matching: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.count_tx_frame();
        stats.count_tx_frame();
        stats.count_non_matching();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tx_frames, 2);
        assert_eq!(snapshot.non_matching, 1);
        assert_eq!(snapshot.rx_frames, 0);
    }

    #[test]
    fn reset_is_idempotent() {
        let stats = Stats::new();
        stats.count_rx_frame();
        stats.count_rx_error();

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
